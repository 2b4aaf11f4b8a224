// backend/src/scope/area_tree.rs

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use crate::error::{CoreError, CoreResult};
use crate::models::Area;

/// Parent edges loaded once per request. Descendant queries walk this map
/// instead of going back to storage per level.
#[derive(Debug, Clone, Default)]
pub struct AreaTree {
    parents: HashMap<i64, Option<i64>>,
    children: HashMap<i64, Vec<i64>>,
    active: HashSet<i64>,
}

impl AreaTree {
    pub fn build(areas: &[Area]) -> CoreResult<Self> {
        let parents: HashMap<i64, Option<i64>> = areas.iter().map(|a| (a.id, a.parent_id)).collect();
        ensure_forest(&parents, "area")?;

        let mut children: HashMap<i64, Vec<i64>> = HashMap::new();
        for a in areas {
            if let Some(p) = a.parent_id {
                children.entry(p).or_default().push(a.id);
            }
        }
        for kids in children.values_mut() {
            kids.sort_unstable();
        }

        Ok(Self {
            parents,
            children,
            active: areas.iter().filter(|a| a.active).map(|a| a.id).collect(),
        })
    }

    pub fn contains(&self, id: i64) -> bool {
        self.parents.contains_key(&id)
    }

    pub fn is_active(&self, id: i64) -> bool {
        self.active.contains(&id)
    }

    /// `root` and everything below it, breadth first. A node reached twice
    /// means the parent edges are not a forest.
    pub fn descendants(&self, root: i64) -> CoreResult<BTreeSet<i64>> {
        if !self.contains(root) {
            return Err(CoreError::not_found(format!("area {root} not found")));
        }
        let mut seen = BTreeSet::new();
        let mut queue = VecDeque::from([root]);
        while let Some(id) = queue.pop_front() {
            if !seen.insert(id) {
                return Err(CoreError::invariant(format!("area hierarchy has a cycle through area {id}")));
            }
            if let Some(kids) = self.children.get(&id) {
                queue.extend(kids.iter().copied());
            }
        }
        Ok(seen)
    }

    /// Union of `descendants` over several roots.
    pub fn descendants_of_all(&self, roots: &[i64]) -> CoreResult<BTreeSet<i64>> {
        let mut out = BTreeSet::new();
        for &r in roots {
            out.extend(self.descendants(r)?);
        }
        Ok(out)
    }
}

/// Every chain of parent pointers must end at a root: no self-parents, no
/// cycles. `what` names the entity in the error ("area", "supervisor").
pub fn ensure_forest(parents: &HashMap<i64, Option<i64>>, what: &str) -> CoreResult<()> {
    let mut cleared: HashSet<i64> = HashSet::new();
    for &start in parents.keys() {
        let mut path = HashSet::new();
        let mut cur = Some(start);
        while let Some(id) = cur {
            if cleared.contains(&id) {
                break;
            }
            if !path.insert(id) {
                return Err(CoreError::invariant(format!("{what} hierarchy has a cycle through {id}")));
            }
            cur = parents.get(&id).copied().flatten();
        }
        cleared.extend(path);
    }
    Ok(())
}
