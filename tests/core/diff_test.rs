//! Tests for `src/diff.rs`.

use observer::diff::new_lines;

fn lines(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_owned()).collect()
}

#[test]
fn appended_lines_are_new() {
    let previous = lines(&["a", "b"]);
    let current = lines(&["a", "b", "c", "d"]);
    assert_eq!(new_lines(&current, &previous), lines(&["c", "d"]));
}

#[test]
fn no_previous_means_everything_is_new() {
    let current = lines(&["a", "b"]);
    assert_eq!(new_lines(&current, &[]), current);
}

#[test]
fn disjoint_reads_return_all_of_current() {
    let previous = lines(&["old 1", "old 2", "old 3"]);
    let current = lines(&["new 1", "new 2"]);
    assert_eq!(new_lines(&current, &previous), current);
}

#[test]
fn rotation_with_shared_tail_reports_only_the_rest() {
    // The log was truncated but the server rewrote one line it had before.
    let previous = lines(&["boot", "x", "y"]);
    let current = lines(&["y", "z"]);
    assert_eq!(new_lines(&current, &previous), lines(&["z"]));
}

#[test]
fn repeated_line_is_reported_per_unmatched_occurrence() {
    let previous = lines(&["<A> hi"]);
    let current = lines(&["<A> hi", "<A> hi", "<A> hi"]);
    assert_eq!(new_lines(&current, &previous), lines(&["<A> hi", "<A> hi"]));
}

#[test]
fn result_is_a_subsequence_of_current() {
    let previous = lines(&["a", "b", "c", "d", "e"]);
    let current = lines(&["a", "x", "c", "y", "e", "z"]);
    let added = new_lines(&current, &previous);
    assert_eq!(added, lines(&["x", "y", "z"]));

    let mut cursor = current.iter();
    for line in &added {
        assert!(cursor.any(|c| c == line), "{line} out of order");
    }
}

#[test]
fn removed_lines_are_not_reported() {
    let previous = lines(&["a", "b", "c"]);
    let current = lines(&["a", "c"]);
    assert!(new_lines(&current, &previous).is_empty());
}
