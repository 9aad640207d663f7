use crate::identity::identity_of_bookmark;
use crate::models::{Bookmark, Direction, IdentityClass, ListEntry, MaterializedList, OrderEntry, Tier};
use std::collections::{HashMap, HashSet};

/// Top-tier membership across both identity classes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopSet {
    paths: HashSet<String>,
    bookmarks: HashSet<String>,
}

impl TopSet {
    pub fn new(top_paths: &[String], top_bookmarks: &[String]) -> Self {
        Self {
            paths: top_paths.iter().cloned().collect(),
            bookmarks: top_bookmarks.iter().cloned().collect(),
        }
    }

    pub fn contains(&self, entry: &OrderEntry) -> bool {
        match entry.kind.class() {
            IdentityClass::Path => self.paths.contains(&entry.id),
            IdentityClass::Bookmark => self.bookmarks.contains(&entry.id),
        }
    }

    pub fn tier_of(&self, entry: &OrderEntry) -> Tier {
        if self.contains(entry) {
            Tier::Top
        } else {
            Tier::Normal
        }
    }
}

/// Swaps the entry keyed by `(class, target)` with its nearest same-tier
/// neighbour. Returns `None` when the target is absent or already sits at the
/// edge of its tier.
pub fn move_in_tier(
    order: &[OrderEntry],
    top: &TopSet,
    class: IdentityClass,
    target: &str,
    direction: Direction,
) -> Option<Vec<OrderEntry>> {
    let target_index = order.iter().position(|entry| entry.key() == (class, target))?;
    let tier = top.tier_of(&order[target_index]);

    let peers = order
        .iter()
        .enumerate()
        .filter(|(_, entry)| top.tier_of(entry) == tier)
        .map(|(index, _)| index)
        .collect::<Vec<_>>();
    let position = peers.iter().position(|index| *index == target_index)?;

    let neighbour = match direction {
        Direction::Up => position.checked_sub(1)?,
        Direction::Down => position + 1,
    };
    let swap_with = *peers.get(neighbour)?;

    let mut next = order.to_vec();
    next.swap(target_index, swap_with);
    Some(next)
}

pub fn partition<'a>(order: &'a [OrderEntry], top: &TopSet) -> (Vec<&'a OrderEntry>, Vec<&'a OrderEntry>) {
    order.iter().partition(|entry| top.contains(entry))
}

/// Projects the order into display groups, top first. Bookmark entries whose
/// record is no longer present are skipped.
pub fn materialize(order: &[OrderEntry], top: &TopSet, bookmarks: &[Bookmark]) -> MaterializedList {
    let records = bookmarks
        .iter()
        .map(|bookmark| (identity_of_bookmark(bookmark), bookmark))
        .collect::<HashMap<_, _>>();
    let project = |entries: Vec<&OrderEntry>, tier: Tier| {
        entries
            .into_iter()
            .filter_map(|entry| match entry.kind.class() {
                IdentityClass::Path => Some(ListEntry::Path {
                    path: entry.id.clone(),
                    kind: entry.kind,
                    tier,
                }),
                IdentityClass::Bookmark => records.get(&entry.id).map(|record| ListEntry::Bookmark {
                    id: entry.id.clone(),
                    record: (*record).clone(),
                    tier,
                }),
            })
            .collect::<Vec<_>>()
    };

    let (top_group, normal_group) = partition(order, top);
    MaterializedList {
        top: project(top_group, Tier::Top),
        normal: project(normal_group, Tier::Normal),
    }
}

#[cfg(test)]
mod tests {
    use super::{materialize, move_in_tier, partition, TopSet};
    use crate::models::{Bookmark, Direction, EntryKind, IdentityClass, ListEntry, OrderEntry, Tier};

    fn files(ids: &[&str]) -> Vec<OrderEntry> {
        ids.iter().map(|id| OrderEntry::new(EntryKind::File, *id)).collect()
    }

    fn ids(order: &[OrderEntry]) -> Vec<&str> {
        order.iter().map(|entry| entry.id.as_str()).collect()
    }

    fn top(paths: &[&str]) -> TopSet {
        let paths = paths.iter().map(|path| path.to_string()).collect::<Vec<_>>();
        TopSet::new(&paths, &[])
    }

    #[test]
    fn move_swaps_with_nearest_same_tier_peer() {
        let order = files(&["/a", "/t", "/b", "/c"]);
        let tiers = top(&["/t"]);

        let moved = move_in_tier(&order, &tiers, IdentityClass::Path, "/b", Direction::Up).expect("moved");
        assert_eq!(ids(&moved), vec!["/b", "/t", "/a", "/c"]);

        let moved = move_in_tier(&order, &tiers, IdentityClass::Path, "/a", Direction::Down).expect("moved");
        assert_eq!(ids(&moved), vec!["/b", "/t", "/a", "/c"]);
    }

    #[test]
    fn up_then_down_restores_order() {
        let order = files(&["/a", "/t1", "/b", "/t2", "/c"]);
        let tiers = top(&["/t1", "/t2"]);
        let up = move_in_tier(&order, &tiers, IdentityClass::Path, "/c", Direction::Up).expect("up");
        let back = move_in_tier(&up, &tiers, IdentityClass::Path, "/c", Direction::Down).expect("down");
        assert_eq!(back, order);
        assert_eq!(tiers.tier_of(&up[2]), Tier::Normal);
    }

    #[test]
    fn tier_edges_are_no_ops() {
        let order = files(&["/t", "/a", "/b"]);
        let tiers = top(&["/t"]);
        assert!(move_in_tier(&order, &tiers, IdentityClass::Path, "/a", Direction::Up).is_none());
        assert!(move_in_tier(&order, &tiers, IdentityClass::Path, "/b", Direction::Down).is_none());
        assert!(move_in_tier(&order, &tiers, IdentityClass::Path, "/t", Direction::Up).is_none());
        assert!(move_in_tier(&order, &tiers, IdentityClass::Path, "/t", Direction::Down).is_none());
    }

    #[test]
    fn absent_target_is_a_no_op() {
        let order = files(&["/a", "/b"]);
        assert!(move_in_tier(&order, &TopSet::default(), IdentityClass::Path, "/zzz", Direction::Down).is_none());
    }

    #[test]
    fn bookmarks_and_files_share_one_tier_sequence() {
        let order = vec![
            OrderEntry::new(EntryKind::File, "/a"),
            OrderEntry::new(EntryKind::Bookmark, "/a:3"),
            OrderEntry::new(EntryKind::Folder, "/dir"),
        ];
        let tiers = TopSet::new(&["/a".to_string()], &[]);
        let moved = move_in_tier(&order, &tiers, IdentityClass::Bookmark, "/a:3", Direction::Down).expect("moved");
        assert_eq!(ids(&moved), vec!["/a", "/dir", "/a:3"]);
    }

    #[test]
    fn same_id_in_both_classes_moves_only_the_requested_entry() {
        let order = vec![
            OrderEntry::new(EntryKind::File, "/odd:7"),
            OrderEntry::new(EntryKind::Bookmark, "/odd:7"),
        ];
        let tiers = TopSet::default();
        let moved = move_in_tier(&order, &tiers, IdentityClass::Bookmark, "/odd:7", Direction::Up).expect("moved");
        assert_eq!(moved[0].kind, EntryKind::Bookmark);
        assert!(move_in_tier(&order, &tiers, IdentityClass::Path, "/odd:7", Direction::Up).is_none());
    }

    #[test]
    fn partition_keeps_relative_order() {
        let order = files(&["/a", "/b", "/c", "/d"]);
        let (top_group, normal_group) = partition(&order, &top(&["/d", "/b"]));
        assert_eq!(top_group.iter().map(|entry| entry.id.as_str()).collect::<Vec<_>>(), vec!["/b", "/d"]);
        assert_eq!(normal_group.iter().map(|entry| entry.id.as_str()).collect::<Vec<_>>(), vec!["/a", "/c"]);
    }

    #[test]
    fn materialize_attaches_bookmark_records() {
        let bookmark = Bookmark::new("/f.ts", 10, 0, "foo");
        let order = vec![
            OrderEntry::new(EntryKind::Bookmark, "/f.ts:10"),
            OrderEntry::new(EntryKind::Folder, "/src"),
            OrderEntry::new(EntryKind::Bookmark, "/f.ts:99"),
        ];
        let tiers = TopSet::new(&["/src".to_string()], &[]);
        let list = materialize(&order, &tiers, &[bookmark.clone()]);

        assert_eq!(list.top_ids(), vec!["/src"]);
        assert_eq!(list.normal.len(), 1);
        match &list.normal[0] {
            ListEntry::Bookmark { record, tier, .. } => {
                assert_eq!(record, &bookmark);
                assert_eq!(*tier, Tier::Normal);
            }
            other => panic!("expected bookmark entry, got {other:?}"),
        }
        match &list.top[0] {
            ListEntry::Path { kind, .. } => assert_eq!(*kind, EntryKind::Folder),
            other => panic!("expected path entry, got {other:?}"),
        }
    }
}
