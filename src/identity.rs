use crate::models::Bookmark;

pub fn identity_of_path(path: &str) -> String {
    path.to_string()
}

pub fn identity_of_bookmark(bookmark: &Bookmark) -> String {
    bookmark_identity(&bookmark.path, bookmark.line)
}

/// Character is not part of the identity: one bookmark per line.
pub fn bookmark_identity(path: &str, line: u32) -> String {
    format!("{path}:{line}")
}

#[cfg(test)]
mod tests {
    use super::{bookmark_identity, identity_of_bookmark, identity_of_path};
    use crate::models::Bookmark;

    #[test]
    fn path_is_its_own_identity() {
        assert_eq!(identity_of_path("/work/src/main.rs"), "/work/src/main.rs");
    }

    #[test]
    fn bookmark_identity_ignores_character() {
        let first = Bookmark::new("/f.ts", 10, 0, "foo");
        let second = Bookmark::new("/f.ts", 10, 7, "foo");
        assert_eq!(identity_of_bookmark(&first), "/f.ts:10");
        assert_eq!(identity_of_bookmark(&first), identity_of_bookmark(&second));
        assert_eq!(bookmark_identity("/f.ts", 20), "/f.ts:20");
    }
}
