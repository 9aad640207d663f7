//! Cursor-relative bookmark navigation. Bookmarks are walked in
//! `(path, line)` order and every query wraps around at the ends.

use crate::models::{Bookmark, CursorPosition, LineDecoration, LineDecorations};
use std::collections::BTreeMap;

fn sorted(bookmarks: &[Bookmark]) -> Vec<&Bookmark> {
    let mut sorted = bookmarks.iter().collect::<Vec<_>>();
    sorted.sort_by(|a, b| a.path.cmp(&b.path).then(a.line.cmp(&b.line)));
    sorted
}

fn is_after(bookmark: &Bookmark, cursor: &CursorPosition) -> bool {
    (bookmark.path.as_str(), bookmark.line) > (cursor.path.as_str(), cursor.line)
}

fn is_before(bookmark: &Bookmark, cursor: &CursorPosition) -> bool {
    (bookmark.path.as_str(), bookmark.line) < (cursor.path.as_str(), cursor.line)
}

pub fn next_bookmark<'a>(bookmarks: &'a [Bookmark], cursor: Option<&CursorPosition>) -> Option<&'a Bookmark> {
    let sorted = sorted(bookmarks);
    let first = sorted.first().copied();
    match cursor {
        Some(cursor) => sorted.into_iter().find(|bookmark| is_after(bookmark, cursor)).or(first),
        None => first,
    }
}

pub fn previous_bookmark<'a>(
    bookmarks: &'a [Bookmark],
    cursor: Option<&CursorPosition>,
) -> Option<&'a Bookmark> {
    let sorted = sorted(bookmarks);
    let last = sorted.last().copied();
    match cursor {
        Some(cursor) => sorted
            .into_iter()
            .rev()
            .find(|bookmark| is_before(bookmark, cursor))
            .or(last),
        None => last,
    }
}

fn in_file<'a>(bookmarks: &'a [Bookmark], path: &str) -> Vec<&'a Bookmark> {
    let mut in_file = bookmarks
        .iter()
        .filter(|bookmark| bookmark.path == path)
        .collect::<Vec<_>>();
    in_file.sort_by_key(|bookmark| bookmark.line);
    in_file
}

pub fn next_bookmark_in_file<'a>(bookmarks: &'a [Bookmark], cursor: &CursorPosition) -> Option<&'a Bookmark> {
    let in_file = in_file(bookmarks, &cursor.path);
    let first = in_file.first().copied();
    in_file
        .into_iter()
        .find(|bookmark| bookmark.line > cursor.line)
        .or(first)
}

pub fn previous_bookmark_in_file<'a>(
    bookmarks: &'a [Bookmark],
    cursor: &CursorPosition,
) -> Option<&'a Bookmark> {
    let in_file = in_file(bookmarks, &cursor.path);
    let last = in_file.last().copied();
    in_file
        .into_iter()
        .rev()
        .find(|bookmark| bookmark.line < cursor.line)
        .or(last)
}

/// One representative per file: the bookmark with the lowest line.
fn file_heads(bookmarks: &[Bookmark]) -> BTreeMap<&str, &Bookmark> {
    let mut heads: BTreeMap<&str, &Bookmark> = BTreeMap::new();
    for bookmark in bookmarks {
        heads
            .entry(bookmark.path.as_str())
            .and_modify(|head| {
                if bookmark.line < head.line {
                    *head = bookmark;
                }
            })
            .or_insert(bookmark);
    }
    heads
}

/// A current file without bookmarks starts over from the first file.
pub fn next_bookmark_file<'a>(bookmarks: &'a [Bookmark], current_path: Option<&str>) -> Option<&'a Bookmark> {
    let heads = file_heads(bookmarks);
    let first = heads.values().next().copied();
    match current_path.filter(|current| heads.contains_key(current)) {
        Some(current) => heads
            .iter()
            .find(|(path, _)| **path > current)
            .map(|(_, head)| *head)
            .or(first),
        None => first,
    }
}

pub fn previous_bookmark_file<'a>(
    bookmarks: &'a [Bookmark],
    current_path: Option<&str>,
) -> Option<&'a Bookmark> {
    let heads = file_heads(bookmarks);
    let last = heads.values().next_back().copied();
    match current_path.filter(|current| heads.contains_key(current)) {
        Some(current) => heads
            .iter()
            .rev()
            .find(|(path, _)| **path < current)
            .map(|(_, head)| *head)
            .or(last),
        None => last,
    }
}

/// Bookmarked lines of the cursor's file, split into the line under the
/// cursor and the rest.
pub fn line_decorations(bookmarks: &[Bookmark], cursor: Option<&CursorPosition>) -> LineDecorations {
    let Some(cursor) = cursor else {
        return LineDecorations::default();
    };

    let mut decorations = LineDecorations {
        path: Some(cursor.path.clone()),
        ..LineDecorations::default()
    };
    for bookmark in in_file(bookmarks, &cursor.path) {
        let decoration = LineDecoration {
            line: bookmark.line,
            hover: format!("Bookmark: {}", bookmark.label),
        };
        if bookmark.line == cursor.line {
            decorations.active.push(decoration);
        } else {
            decorations.normal.push(decoration);
        }
    }
    decorations
}
