use super::*;

#[test]
fn tabs_and_long_whitespace_runs() {
    let input = format!("Hello\t\tWorld{}Foo", " ".repeat(6));
    assert_eq!(clean_text(&input), "Hello World \nFoo");
}

#[test]
fn empty_input() {
    assert_eq!(clean_text(""), "");
    assert_eq!(clean_text("   \t  \n "), "");
}

#[test]
fn short_whitespace_runs_are_kept() {
    assert_eq!(clean_text("one    two"), "one    two");
}

#[test]
fn misencoded_characters_are_repaired() {
    assert_eq!(clean_text("invesÆŸng"), "investing");
    assert_eq!(clean_text("the adviserâ€™s duty"), "the adviser's duty");
    assert_eq!(clean_text("\u{201c}quoted\u{201d}"), "\"quoted\"");
    assert_eq!(clean_text("\u{fb01}duciary"), "fiduciary");
}

#[test]
fn non_printable_characters_are_removed() {
    assert_eq!(clean_text("caf\u{e9} \u{7}bell\r\n"), "caf bell");
    assert_eq!(clean_text("line one\nline two"), "line one\nline two");
}

#[test]
fn leading_and_trailing_whitespace_is_stripped() {
    assert_eq!(clean_text("\n\n  padded text \t "), "padded text");
}

#[test]
fn newlines_count_toward_whitespace_runs() {
    assert_eq!(clean_text("Section 1\n\n\n\n\nSection 2"), "Section 1 \nSection 2");
}

#[test]
fn line_feeds_survive_the_ascii_filter() {
    assert_eq!(clean_text("first\r\nsecond\u{b}\u{c}third"), "first\nsecondthird");
    assert_eq!(
        clean_text("intro      body").split('\n').collect::<Vec<_>>(),
        vec!["intro ", "body"]
    );
}
