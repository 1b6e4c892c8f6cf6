use gallery_core::{identity_of, IdentityResolver, ItemReference};
use pretty_assertions::{assert_eq, assert_ne};

fn id(url: &str) -> String {
    identity_of(&ItemReference::from(url))
        .expect("identity")
        .to_string()
}

#[test]
fn fbid_query_parameter_wins_over_path() {
    assert_eq!(
        id("https://www.facebook.com/photo/?fbid=10155&set=a.998"),
        "10155"
    );
    assert_eq!(
        id("https://www.facebook.com/photo.php?fbid=10155&set=a.998&type=3"),
        "10155"
    );
}

#[test]
fn query_and_size_variants_share_one_identity() {
    let variants = [
        "https://cdn.example.com/media/123456_789_n.jpg?stp=dst-jpg&oh=abc",
        "https://cdn.example.com/media/123456_789_o.jpg",
        "https://cdn.example.com/media/123456_789-640x480.png?w=640",
        "https://cdn.example.com/media/123456_789@2x.webp",
        "https://cdn.example.com/media/123456_789/",
    ];
    for variant in variants {
        assert_eq!(id(variant), "123456_789", "variant {variant}");
    }
}

#[test]
fn distinct_items_with_letter_suffixes_stay_distinct() {
    let a = id("https://gallery.example/items/beach_a");
    let b = id("https://gallery.example/items/beach_b.jpg");
    assert_ne!(a, b);
    assert_eq!(a, "beach_a");
    assert_eq!(id("https://gallery.example/items/trip_2024_x"), "trip_2024_x");
}

#[test]
fn trailing_path_segment_is_used_without_id_param() {
    assert_eq!(
        id("https://www.facebook.com/someone/photos/a.111/2222/?type=3"),
        "2222"
    );
}

#[test]
fn custom_id_params_are_honoured() {
    let resolver = IdentityResolver::new(vec!["pid".to_string()]);
    let identity = resolver
        .identity_of(&ItemReference::from("https://gallery.example/view?pid=abc-42"))
        .unwrap();
    assert_eq!(identity.as_str(), "abc-42");
}

#[test]
fn malformed_references_are_rejected() {
    for raw in [
        "not a url",
        "https://www.facebook.com/",
        "https://www.facebook.com/someone/photos/",
        "mailto:someone@example.com",
        "https://www.facebook.com/photo/?fbid=",
    ] {
        let err = identity_of(&ItemReference::from(raw)).unwrap_err();
        assert_eq!(err.reference, raw);
    }
}

#[test]
fn identities_are_filesystem_safe() {
    let identity = id("https://example.com/items/we%20ird:name");
    assert!(identity
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')));
}
