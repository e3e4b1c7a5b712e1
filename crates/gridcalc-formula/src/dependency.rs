//! Dependency tracking for formula calculation

use crate::error::{FormulaError, FormulaResult};
use crate::token::Token;
use ahash::{AHashMap, AHashSet};
use gridcalc_core::CellAddress;
use std::collections::BTreeSet;
use tracing::{debug, warn};

/// Every cell a token sequence reads
///
/// Function arguments are searched recursively and ranges are expanded to
/// their individual cells.
///
/// # Example
/// ```rust
/// use gridcalc_formula::{extract_dependencies, tokenize};
///
/// let deps = extract_dependencies(&tokenize("=SUM(A1:A3) + A2 * B1").unwrap());
/// let names: Vec<String> = deps.iter().map(|a| a.to_string()).collect();
/// assert_eq!(names, ["A1", "B1", "A2", "A3"]);
/// ```
pub fn extract_dependencies(tokens: &[Token]) -> BTreeSet<CellAddress> {
    let mut deps = BTreeSet::new();
    collect(tokens, &mut deps);
    deps
}

fn collect(tokens: &[Token], deps: &mut BTreeSet<CellAddress>) {
    for token in tokens {
        match token {
            Token::Reference(addr) => {
                deps.insert(*addr);
            }
            Token::Range(range) => deps.extend(range.cells()),
            Token::Function { args, .. } => {
                for arg in args {
                    collect(arg, deps);
                }
            }
            _ => {}
        }
    }
}

/// Dependency graph for formula cells
///
/// A cell is registered once it holds a formula, even one that reads no
/// other cells. Edges run from a formula cell to the cells it reads
/// (precedents); the reverse index maps a cell to the formulas reading it
/// (dependents). The graph is kept acyclic: [`update`](Self::update) refuses
/// any change that would close a loop.
#[derive(Debug, Default, Clone)]
pub struct DependencyGraph {
    /// Formula cell → cells it reads
    precedents: AHashMap<CellAddress, BTreeSet<CellAddress>>,
    /// Cell → formula cells that read it
    dependents: AHashMap<CellAddress, BTreeSet<CellAddress>>,
}

impl DependencyGraph {
    /// Create a new empty dependency graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `cell` currently holds a registered formula
    pub fn is_registered(&self, cell: &CellAddress) -> bool {
        self.precedents.contains_key(cell)
    }

    /// Number of registered formula cells
    pub fn len(&self) -> usize {
        self.precedents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.precedents.is_empty()
    }

    /// Cells the formula at `cell` reads
    pub fn precedents(&self, cell: &CellAddress) -> impl Iterator<Item = CellAddress> + '_ {
        self.precedents
            .get(cell)
            .into_iter()
            .flat_map(|set| set.iter().copied())
    }

    /// Formula cells that read `cell` directly
    pub fn dependents(&self, cell: &CellAddress) -> impl Iterator<Item = CellAddress> + '_ {
        self.dependents
            .get(cell)
            .into_iter()
            .flat_map(|set| set.iter().copied())
    }

    /// Check whether giving `cell` the dependencies `deps` would close a loop
    ///
    /// Returns the offending path, starting and ending at `cell`
    /// (`[A1, B1, A1]`). A cell that reads itself yields `[A1, A1]`.
    pub fn would_create_cycle(
        &self,
        cell: CellAddress,
        deps: &BTreeSet<CellAddress>,
    ) -> Option<Vec<CellAddress>> {
        if deps.contains(&cell) {
            return Some(vec![cell, cell]);
        }

        // Walk precedents from each new dependency; reaching `cell` means the
        // new edge set would make it depend on itself.
        let mut parent: AHashMap<CellAddress, CellAddress> = AHashMap::new();
        let mut seen: AHashSet<CellAddress> = AHashSet::new();

        for &start in deps {
            if !seen.insert(start) {
                continue;
            }
            let mut stack = vec![start];
            while let Some(current) = stack.pop() {
                for next in self.precedents(&current) {
                    if next == cell {
                        return Some(Self::cycle_path(cell, current, &parent));
                    }
                    if seen.insert(next) {
                        parent.insert(next, current);
                        stack.push(next);
                    }
                }
            }
        }
        None
    }

    fn cycle_path(
        cell: CellAddress,
        last: CellAddress,
        parent: &AHashMap<CellAddress, CellAddress>,
    ) -> Vec<CellAddress> {
        let mut path = vec![last];
        let mut current = last;
        while let Some(&prev) = parent.get(&current) {
            path.push(prev);
            current = prev;
        }
        path.push(cell);
        path.reverse();
        path.push(cell);
        path
    }

    /// Register or replace the dependencies of the formula at `cell`
    ///
    /// The cycle check runs first; on a cycle nothing changes and
    /// [`FormulaError::CircularReference`] is returned.
    pub fn update(&mut self, cell: CellAddress, deps: BTreeSet<CellAddress>) -> FormulaResult<()> {
        if let Some(cells) = self.would_create_cycle(cell, &deps) {
            let err = FormulaError::CircularReference { cells };
            warn!(%cell, %err, "rejected dependency update");
            return Err(err);
        }

        self.unlink(&cell);
        for dep in &deps {
            self.dependents.entry(*dep).or_default().insert(cell);
        }
        debug!(%cell, count = deps.len(), "registered formula dependencies");
        self.precedents.insert(cell, deps);
        Ok(())
    }

    /// Unregister the formula at `cell`
    ///
    /// Formulas that read `cell` keep their edges to it. Returns whether the
    /// cell was registered.
    pub fn remove(&mut self, cell: &CellAddress) -> bool {
        let removed = self.unlink(cell);
        if removed {
            debug!(%cell, "unregistered formula");
        }
        removed
    }

    /// Drop the out-edges of `cell` and its registration
    fn unlink(&mut self, cell: &CellAddress) -> bool {
        let Some(old) = self.precedents.remove(cell) else {
            return false;
        };
        for dep in old {
            if let Some(readers) = self.dependents.get_mut(&dep) {
                readers.remove(cell);
                if readers.is_empty() {
                    self.dependents.remove(&dep);
                }
            }
        }
        true
    }

    /// Every formula cell that reads `cell` directly or indirectly
    pub fn transitive_dependents(&self, cell: &CellAddress) -> BTreeSet<CellAddress> {
        let mut out = BTreeSet::new();
        let mut stack: Vec<CellAddress> = self.dependents(cell).collect();
        while let Some(next) = stack.pop() {
            if out.insert(next) {
                stack.extend(self.dependents(&next));
            }
        }
        out
    }

    /// Cells to recalculate after `changed` were edited, in dependency order
    ///
    /// The changed cells and all of their transitive dependents are listed
    /// once each, every cell after the cells it reads. Shared dependents of a
    /// diamond are visited a single time.
    pub fn recalc_order(&self, changed: &[CellAddress]) -> Vec<CellAddress> {
        let mut visited: AHashSet<CellAddress> = AHashSet::new();
        let mut post_order = Vec::new();

        for &root in changed {
            // (cell, children already pushed)
            let mut stack = vec![(root, false)];
            while let Some((cell, expanded)) = stack.pop() {
                if expanded {
                    post_order.push(cell);
                    continue;
                }
                if !visited.insert(cell) {
                    continue;
                }
                stack.push((cell, true));
                for dependent in self.dependents(&cell) {
                    if !visited.contains(&dependent) {
                        stack.push((dependent, false));
                    }
                }
            }
        }

        post_order.reverse();
        debug!(
            changed = changed.len(),
            scheduled = post_order.len(),
            "computed recalculation order"
        );
        post_order
    }

    /// All registered formula cells, every cell after the cells it reads
    pub fn evaluation_order(&self) -> Vec<CellAddress> {
        let mut roots: Vec<CellAddress> = self.precedents.keys().copied().collect();
        roots.sort_unstable();
        self.recalc_order(&roots)
    }

    /// Remove every formula registration
    pub fn clear(&mut self) {
        self.precedents.clear();
        self.dependents.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::tokenize;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn addr(s: &str) -> CellAddress {
        CellAddress::parse(s).unwrap()
    }

    fn set(cells: &[&str]) -> BTreeSet<CellAddress> {
        cells.iter().map(|c| addr(c)).collect()
    }

    fn position(order: &[CellAddress], cell: &str) -> usize {
        order.iter().position(|c| *c == addr(cell)).unwrap()
    }

    #[test]
    fn test_extract_dependencies() {
        let tokens = tokenize("=A1 + SUM(B1:B3, IF(C1, A1, D4))").unwrap();
        assert_eq!(
            extract_dependencies(&tokens),
            set(&["A1", "B1", "B2", "B3", "C1", "D4"])
        );
        assert!(extract_dependencies(&tokenize("=1+2").unwrap()).is_empty());
    }

    #[test]
    fn test_update_and_query() {
        let mut graph = DependencyGraph::new();
        graph.update(addr("C1"), set(&["A1", "B1"])).unwrap();
        graph.update(addr("D1"), set(&["C1"])).unwrap();

        assert!(graph.is_registered(&addr("C1")));
        assert!(!graph.is_registered(&addr("A1")));
        assert_eq!(graph.precedents(&addr("C1")).collect::<Vec<_>>(), vec![addr("A1"), addr("B1")]);
        assert_eq!(graph.dependents(&addr("A1")).collect::<Vec<_>>(), vec![addr("C1")]);
        assert_eq!(graph.transitive_dependents(&addr("A1")), set(&["C1", "D1"]));

        // editing replaces the old edges
        graph.update(addr("C1"), set(&["B1"])).unwrap();
        assert_eq!(graph.dependents(&addr("A1")).count(), 0);
        assert_eq!(graph.transitive_dependents(&addr("B1")), set(&["C1", "D1"]));
    }

    #[test]
    fn test_formula_without_references_is_registered() {
        let mut graph = DependencyGraph::new();
        graph.update(addr("A1"), BTreeSet::new()).unwrap();
        assert!(graph.is_registered(&addr("A1")));
        assert_eq!(graph.len(), 1);
    }

    #[test]
    fn test_remove_keeps_readers() {
        let mut graph = DependencyGraph::new();
        graph.update(addr("A1"), set(&["Z9"])).unwrap();
        graph.update(addr("B1"), set(&["A1"])).unwrap();

        assert!(graph.remove(&addr("A1")));
        assert!(!graph.remove(&addr("A1")));
        assert!(!graph.is_registered(&addr("A1")));
        assert_eq!(graph.dependents(&addr("Z9")).count(), 0);
        assert_eq!(graph.dependents(&addr("A1")).collect::<Vec<_>>(), vec![addr("B1")]);
    }

    #[test]
    fn test_self_reference_is_a_cycle() {
        let graph = DependencyGraph::new();
        assert_eq!(
            graph.would_create_cycle(addr("A1"), &set(&["A1"])),
            Some(vec![addr("A1"), addr("A1")])
        );
    }

    #[test]
    fn test_cycle_rejected_and_graph_untouched() {
        let mut graph = DependencyGraph::new();
        graph.update(addr("B1"), set(&["C1"])).unwrap();
        graph.update(addr("C1"), set(&["A1"])).unwrap();
        let before = graph.clone();

        let err = graph.update(addr("A1"), set(&["B1"])).unwrap_err();
        assert_eq!(
            err,
            FormulaError::CircularReference {
                cells: vec![addr("A1"), addr("B1"), addr("C1"), addr("A1")],
            }
        );
        assert!(!graph.is_registered(&addr("A1")));
        assert_eq!(graph.precedents, before.precedents);
        assert_eq!(graph.dependents, before.dependents);
    }

    #[test]
    fn test_rejected_edit_keeps_old_dependencies() {
        let mut graph = DependencyGraph::new();
        graph.update(addr("A1"), set(&["C1"])).unwrap();
        graph.update(addr("B1"), set(&["A1"])).unwrap();

        assert!(graph.update(addr("A1"), set(&["B1"])).is_err());
        assert_eq!(graph.precedents(&addr("A1")).collect::<Vec<_>>(), vec![addr("C1")]);
    }

    #[test]
    fn test_recalc_order_diamond() {
        // A1 <- B1, A1 <- C1, (B1, C1) <- D1
        let mut graph = DependencyGraph::new();
        graph.update(addr("B1"), set(&["A1"])).unwrap();
        graph.update(addr("C1"), set(&["A1"])).unwrap();
        graph.update(addr("D1"), set(&["B1", "C1"])).unwrap();

        let order = graph.recalc_order(&[addr("A1")]);
        assert_eq!(order.len(), 4);
        assert_eq!(order[0], addr("A1"));
        assert!(position(&order, "B1") < position(&order, "D1"));
        assert!(position(&order, "C1") < position(&order, "D1"));
    }

    #[test]
    fn test_evaluation_order_respects_chains() {
        let mut graph = DependencyGraph::new();
        graph.update(addr("A3"), set(&["A2"])).unwrap();
        graph.update(addr("A2"), set(&["A1"])).unwrap();
        graph.update(addr("A1"), BTreeSet::new()).unwrap();
        graph.update(addr("B1"), set(&["A3", "A1"])).unwrap();

        let order = graph.evaluation_order();
        assert_eq!(order.len(), 4);
        assert!(position(&order, "A1") < position(&order, "A2"));
        assert!(position(&order, "A2") < position(&order, "A3"));
        assert!(position(&order, "A3") < position(&order, "B1"));
    }

    #[test]
    fn test_clear() {
        let mut graph = DependencyGraph::new();
        graph.update(addr("A1"), set(&["B1"])).unwrap();
        graph.clear();
        assert!(graph.is_empty());
        assert_eq!(graph.dependents(&addr("B1")).count(), 0);
    }

    proptest! {
        #[test]
        fn prop_extracts_every_referenced_cell(
            cells in prop::collection::vec((1u32..200, 1u32..60), 1..12)
        ) {
            let refs: Vec<String> = cells
                .iter()
                .map(|(row, col)| CellAddress::new(*row, *col).to_string())
                .collect();
            let formula = format!("=SUM({}) + {}", refs.join(", "), refs[0]);
            let expected: BTreeSet<CellAddress> =
                cells.iter().map(|(row, col)| CellAddress::new(*row, *col)).collect();
            prop_assert_eq!(extract_dependencies(&tokenize(&formula).unwrap()), expected);
        }

        #[test]
        fn prop_range_expands_to_its_cells(
            a in (1u32..30, 1u32..10),
            b in (1u32..30, 1u32..10),
        ) {
            let range = CellAddress::new(a.0, a.1).to(CellAddress::new(b.0, b.1));
            let tokens = tokenize(&format!("=SUM({})", range)).unwrap();
            let deps = extract_dependencies(&tokens);
            prop_assert_eq!(deps.len() as u64, range.cell_count());
            prop_assert!(deps.iter().all(|c| range.contains(c)));
        }
    }
}
