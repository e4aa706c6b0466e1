use super::{CheckResult, CheckSess, DeclKind};
use crate::{info::Initializer, workspace::object::ObjectId};
use indexmap::{IndexMap, IndexSet};
use std::collections::HashSet;

#[derive(Debug, Default, Clone)]
struct Node {
    succ: IndexSet<ObjectId>,
    pred: IndexSet<ObjectId>,
    is_func: bool,
}

impl<'s> CheckSess<'s> {
    /// Appends the initializers of this batch's package-level variables to
    /// the initialization order, dependencies first.
    pub fn init_order(&mut self) -> CheckResult {
        let _span = tracing::debug_span!("init_order").entered();

        self.drop_replaced_initializers();

        let mut graph = self.dependency_graph();
        let mut ndeps: IndexMap<ObjectId, usize> = graph
            .iter()
            .filter(|(_, n)| !n.is_func)
            .map(|(obj, n)| (*obj, n.succ.len()))
            .collect();

        let mut emitted: HashSet<ObjectId> = HashSet::new();
        // Members of reported cycles get no initializer.
        let mut cyclic: HashSet<ObjectId> = HashSet::new();

        while !ndeps.is_empty() {
            let next = ndeps
                .iter()
                .min_by_key(|(obj, n)| (**n, self.ws.object(**obj).order))
                .map(|(obj, n)| (*obj, *n));
            let (obj, n) = match next {
                Some(next) => next,
                None => break,
            };
            ndeps.shift_remove(&obj);

            if n > 0 && !cyclic.contains(&obj) {
                if let Some(cycle) = self.init_cycle(obj) {
                    self.report_init_cycle(&cycle);
                    cyclic.extend(cycle);
                }
            }

            if let Some(node) = graph.remove(&obj) {
                for p in &node.pred {
                    if let Some(count) = ndeps.get_mut(p) {
                        *count = count.saturating_sub(1);
                    }
                }
            }

            if cyclic.contains(&obj) {
                continue;
            }
            self.emit_initializer(obj, &mut emitted);
        }

        self.checkpoint()
    }

    /// Variables displaced by a redeclaration no longer have a place in the
    /// order.
    fn drop_replaced_initializers(&mut self) {
        if self.replaced.is_empty() {
            return;
        }

        let replaced: HashSet<ObjectId> = self.replaced.iter().copied().collect();
        if let Some(order) = self.chk.info.init_order.as_mut() {
            order.retain(|init| !init.lhs.iter().any(|v| replaced.contains(v)));
        }
        for var in &replaced {
            self.chk.ordered.remove(var);
        }
    }

    /// The dependencies between the variables of this batch, with functions
    /// removed and their edges routed through to the variables they use.
    fn dependency_graph(&self) -> IndexMap<ObjectId, Node> {
        let batch: IndexSet<ObjectId> = self
            .batch
            .iter()
            .copied()
            .filter(|obj| {
                matches!(
                    self.chk.obj_map.get(obj).map(|d| &d.kind),
                    Some(DeclKind::Var { .. } | DeclKind::Func(_))
                )
            })
            .collect();

        let mut graph: IndexMap<ObjectId, Node> = IndexMap::new();
        for obj in &batch {
            let is_func = matches!(self.chk.obj_map[obj].kind, DeclKind::Func(_));
            graph.entry(*obj).or_default().is_func = is_func;

            for dep in self.deps_of(*obj) {
                if !batch.contains(&dep) {
                    continue;
                }
                graph.entry(*obj).or_default().succ.insert(dep);
                graph.entry(dep).or_default().pred.insert(*obj);
            }
        }

        let funcs: Vec<ObjectId> = graph.iter().filter(|(_, n)| n.is_func).map(|(o, _)| *o).collect();
        for f in funcs {
            let node = match graph.get(&f) {
                Some(node) => node.clone(),
                None => continue,
            };

            for p in node.pred.iter().filter(|p| **p != f) {
                for s in node.succ.iter().filter(|s| **s != f) {
                    graph.entry(*p).or_default().succ.insert(*s);
                    graph.entry(*s).or_default().pred.insert(*p);
                }
                graph.entry(*p).or_default().succ.shift_remove(&f);
            }
            for s in &node.succ {
                graph.entry(*s).or_default().pred.shift_remove(&f);
            }
            graph.shift_remove(&f);
        }

        graph
    }

    /// The objects a declaration refers to. The variables of an n:1
    /// declaration share the dependencies of their initializer.
    fn deps_of(&self, obj: ObjectId) -> IndexSet<ObjectId> {
        let decl = match self.chk.obj_map.get(&obj) {
            Some(decl) => decl,
            None => return IndexSet::new(),
        };

        match &decl.kind {
            DeclKind::Var { lhs, .. } if lhs.len() > 1 => lhs
                .iter()
                .filter_map(|v| self.chk.obj_map.get(v))
                .flat_map(|d| d.deps.iter().copied())
                .collect(),
            _ => decl.deps.clone(),
        }
    }

    /// The objects on a dependency cycle through `obj`, starting with `obj`.
    /// `None` if `obj` only waits on a cycle elsewhere.
    fn init_cycle(&self, obj: ObjectId) -> Option<Vec<ObjectId>> {
        let path = self.find_path(obj, obj, &mut HashSet::new())?;
        let mut cycle = vec![obj];
        cycle.extend(path.into_iter().filter(|o| *o != obj));
        Some(cycle)
    }

    fn report_init_cycle(&mut self, cycle: &[ObjectId]) {
        // Cycles among variables alone were reported when they were declared.
        let invalid = self.ws.types.invalid();
        if cycle.iter().any(|o| self.ws.object(*o).ty == Some(invalid)) {
            return;
        }

        self.cycle_error(cycle, "initialization cycle for");
    }

    /// A path of dependencies leading from `from` to `to`, excluding `from`.
    fn find_path(&self, from: ObjectId, to: ObjectId, seen: &mut HashSet<ObjectId>) -> Option<Vec<ObjectId>> {
        if !seen.insert(from) {
            return None;
        }

        for dep in self.deps_of(from) {
            if dep == to {
                return Some(vec![dep]);
            }
            if let Some(mut path) = self.find_path(dep, to, seen) {
                path.insert(0, dep);
                return Some(path);
            }
        }

        None
    }

    fn emit_initializer(&mut self, obj: ObjectId, emitted: &mut HashSet<ObjectId>) {
        let (lhs, init) = match self.chk.obj_map.get(&obj).map(|d| &d.kind) {
            Some(DeclKind::Var { lhs, init: Some(init), .. }) => (lhs.clone(), init.clone()),
            _ => return,
        };

        let first = lhs.first().copied().unwrap_or(obj);
        if !emitted.insert(first) || self.chk.ordered.contains(&obj) {
            return;
        }

        self.chk.ordered.extend(lhs.iter().copied());

        let init = Initializer { lhs, rhs: init };
        tracing::trace!(init = %init.display(self.ws), "initializer");

        if let Some(order) = self.chk.info.init_order.as_mut() {
            order.push(init);
        }
    }
}
