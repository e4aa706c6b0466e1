use super::{operand::Operand, CheckSess, Context};
use crate::{
    ast::{
        display::expr_string, AssignOp, BinaryOp, Block, BranchKind, CaseClause, ChanDir, Expr, ExprKind, Ident,
        Stmt, StmtKind, UnaryOp,
    },
    constant::ConstValue,
    error::ErrorKind,
    info::OperandMode,
    span::Span,
    types::{BasicKind, Type, TypeId},
    workspace::{
        object::{BuiltinId, ObjectFlags, ObjectId, ObjectKind},
        scope::ScopeId,
        NewObject,
    },
};
use bitflags::bitflags;
use indexmap::IndexMap;
use std::collections::HashSet;
use ustr::Ustr;

bitflags! {
    /// Which branch statements are valid at a position.
    pub(crate) struct StmtCtx: u8 {
        const BREAK_OK = 1 << 0;
        const CONTINUE_OK = 1 << 1;
        const FALLTHROUGH_OK = 1 << 2;
        const FINAL_SWITCH_CASE = 1 << 3;
    }
}

impl<'s> CheckSess<'s> {
    /// Checks the body of a function or function literal with signature `sig`.
    pub fn func_body(&mut self, name: Ustr, decl: Option<ObjectId>, sig: TypeId, body: &Block) {
        let _span = tracing::trace_span!("func_body", %name).entered();

        let signature = match self.ws.types.get(sig) {
            Type::Signature(s) => s.clone(),
            _ => return,
        };
        let scope = match signature.scope {
            Some(scope) => scope,
            None => return,
        };

        let ctx = Context {
            scope,
            decl,
            sig: Some(sig),
            func_scope: Some(scope),
            ..Default::default()
        };

        self.with_context(ctx, |sess| {
            sess.stmt_list(StmtCtx::empty(), &body.stmts);
            sess.labels(&body.stmts);

            if has_results(sess, signature.results) && !sess.is_terminating_list(&body.stmts, None) {
                let end = Span::new(body.span.file_id, body.span.end.saturating_sub(1), body.span.end);
                sess.error(ErrorKind::TypeMismatch, end, "missing return");
            }
        });

        self.unused_vars(scope);
    }

    /// Checks a statement that appears at the top level of a file.
    pub fn top_level_stmt(&mut self, stmt: &Stmt) {
        let file_scope = self.ctx.scope;
        let before = self.ws.scope(file_scope).children.len();

        self.stmt(StmtCtx::empty(), stmt);
        self.labels(std::slice::from_ref(stmt));

        let opened: Vec<ScopeId> = self.ws.scope(file_scope).children[before..]
            .iter()
            .copied()
            .filter(|s| !self.ws.scope(*s).is_func)
            .collect();
        for scope in opened {
            self.unused_vars(scope);
        }
    }

    fn stmt_list(&mut self, ctx: StmtCtx, stmts: &[Stmt]) {
        let inner = ctx & !(StmtCtx::FALLTHROUGH_OK | StmtCtx::FINAL_SWITCH_CASE);
        let last = trim_trailing_empty(stmts).len();

        for (i, stmt) in stmts.iter().enumerate() {
            let mut c = inner;
            if i + 1 == last {
                c |= ctx & (StmtCtx::FALLTHROUGH_OK | StmtCtx::FINAL_SWITCH_CASE);
            }
            self.stmt(c, stmt);
        }
    }

    fn open_scope(&mut self, node: crate::ast::NodeId, span: Span, comment: &str) -> ScopeId {
        let scope = self.ws.new_scope(Some(self.ctx.scope), span, comment);
        self.record_scope(node, scope);
        scope
    }

    fn in_scope<T>(&mut self, scope: ScopeId, f: impl FnOnce(&mut Self) -> T) -> T {
        let saved = std::mem::replace(&mut self.ctx.scope, scope);
        let result = f(self);
        self.ctx.scope = saved;
        result
    }

    fn block(&mut self, ctx: StmtCtx, block: &Block) {
        let scope = self.open_scope(block.id, block.span, "block");
        self.in_scope(scope, |sess| sess.stmt_list(ctx, &block.stmts));
    }

    fn simple_stmt(&mut self, stmt: Option<&Stmt>) {
        if let Some(stmt) = stmt {
            self.stmt(StmtCtx::empty(), stmt);
        }
    }

    fn stmt(&mut self, ctx: StmtCtx, stmt: &Stmt) {
        let inner = ctx & !(StmtCtx::FALLTHROUGH_OK | StmtCtx::FINAL_SWITCH_CASE);

        match &stmt.kind {
            StmtKind::Bad | StmtKind::Empty => (),
            StmtKind::Decl(gen) => self.local_decl(gen),
            StmtKind::Labeled { stmt: inner_stmt, .. } => self.stmt(ctx, inner_stmt),
            StmtKind::Expr(e) => self.expr_stmt(e),
            StmtKind::Send { chan, value } => self.send(chan, value),
            StmtKind::IncDec { x, inc } => self.inc_dec(x, *inc),
            StmtKind::Assign { lhs, op, rhs } => match op {
                AssignOp::Define => self.short_var_decl(stmt, lhs, rhs),
                AssignOp::Assign => self.assign_vars(lhs, rhs),
                AssignOp::Op(op) => self.op_assign(stmt, lhs, *op, rhs),
            },
            StmtKind::Go(call) => self.suspended_call("go", call),
            StmtKind::Defer(call) => self.suspended_call("defer", call),
            StmtKind::Return(results) => self.return_stmt(stmt, results),
            StmtKind::Branch { kind, label } => {
                if label.is_none() {
                    self.branch(ctx, *kind, stmt.span);
                }
            }
            StmtKind::Block(block) => self.block(inner, block),
            StmtKind::If { init, cond, then, els } => {
                let scope = self.open_scope(stmt.id, stmt.span, "if");
                self.in_scope(scope, |sess| {
                    sess.simple_stmt(init.as_deref());
                    let x = sess.expr(cond);
                    if !x.is_invalid() && !sess.ws.is_boolean(x.ty) {
                        sess.invalid_op(cond.span, "non-boolean condition in if statement");
                    }
                    sess.block(inner, then);
                    if let Some(els) = els {
                        sess.stmt(inner, els);
                    }
                });
            }
            StmtKind::Switch { init, tag, body } => {
                let scope = self.open_scope(stmt.id, stmt.span, "switch");
                self.in_scope(scope, |sess| sess.switch(inner, init.as_deref(), tag.as_ref(), body));
            }
            StmtKind::TypeSwitch { init, assign, body } => {
                let scope = self.open_scope(stmt.id, stmt.span, "type switch");
                self.in_scope(scope, |sess| sess.type_switch(inner, init.as_deref(), assign, body));
            }
            StmtKind::For { init, cond, post, body } => {
                let scope = self.open_scope(stmt.id, stmt.span, "for");
                self.in_scope(scope, |sess| {
                    sess.simple_stmt(init.as_deref());
                    if let Some(cond) = cond {
                        let x = sess.expr(cond);
                        if !x.is_invalid() && !sess.ws.is_boolean(x.ty) {
                            sess.invalid_op(cond.span, "non-boolean condition in for statement");
                        }
                    }
                    if let Some(post) = post {
                        if let StmtKind::Assign {
                            op: AssignOp::Define, ..
                        } = post.kind
                        {
                            sess.invalid_op(post.span, "cannot declare in post statement of for loop");
                        }
                        sess.stmt(StmtCtx::empty(), post);
                    }
                    sess.block(inner | StmtCtx::BREAK_OK | StmtCtx::CONTINUE_OK, body);
                });
            }
            StmtKind::Range {
                key,
                value,
                define,
                x,
                body,
            } => {
                let scope = self.open_scope(stmt.id, stmt.span, "range");
                self.in_scope(scope, |sess| {
                    sess.range(stmt, key.as_ref(), value.as_ref(), *define, x);
                    sess.block(inner | StmtCtx::BREAK_OK | StmtCtx::CONTINUE_OK, body);
                });
            }
        }
    }

    fn expr_stmt(&mut self, e: &Expr) {
        let x = self.raw_expr(e, None);
        if x.is_invalid() {
            return;
        }

        let used = match &e.unparen().kind {
            ExprKind::Call { fun, .. } => match self.builtin_of(fun) {
                Some(id) => id.is_statement(),
                None => x.mode != OperandMode::TypeExpr,
            },
            ExprKind::Unary { op: UnaryOp::Recv, .. } => true,
            _ => false,
        };

        if !used {
            let msg = format!("{} is not used", self.describe(&x));
            self.invalid_op(e.span, msg);
        }
    }

    /// The builtin a call's function expression denotes, if any.
    fn builtin_of(&self, fun: &Expr) -> Option<BuiltinId> {
        let obj = match &fun.unparen().kind {
            ExprKind::Ident(name) => self.ws.lookup_parent(self.ctx.scope, *name)?.1,
            ExprKind::Selector { x, sel } => {
                let name = x.as_ident()?;
                let (_, pkg_name) = self.ws.lookup_parent(self.ctx.scope, name.name)?;
                match self.ws.object(pkg_name).kind {
                    ObjectKind::PkgName(pkg) if pkg == self.ws.universe.unsafe_pkg => {
                        self.ws.pkg_lookup(pkg, &sel.name)?
                    }
                    _ => return None,
                }
            }
            _ => return None,
        };

        match self.ws.object(obj).kind {
            ObjectKind::Builtin(id) => Some(id),
            _ => None,
        }
    }

    fn send(&mut self, chan: &Expr, value: &Expr) {
        let ch = self.expr(chan);
        let mut v = self.expr(value);
        if ch.is_invalid() || v.is_invalid() {
            return;
        }

        let under = self.ws.underlying(ch.ty);
        match self.ws.types.get(under) {
            Type::Chan(c) if c.dir == ChanDir::Recv => {
                let msg = format!("invalid operation: cannot send to receive-only channel {}", self.describe(&ch));
                self.invalid_op(chan.span, msg);
            }
            Type::Chan(c) => {
                let elem = c.elem;
                self.assignment(&mut v, Some(elem), "send");
            }
            _ => {
                let msg = format!("invalid operation: cannot send to non-chan {}", self.describe(&ch));
                self.invalid_op(chan.span, msg);
            }
        }
    }

    fn suspended_call(&mut self, keyword: &str, e: &Expr) {
        match &e.unparen().kind {
            ExprKind::Call { fun, .. } => {
                let builtin = self.builtin_of(fun);
                let x = self.raw_expr(e, None);
                if x.is_invalid() {
                    return;
                }
                if let Some(id) = builtin {
                    if !id.is_statement() {
                        let msg = format!("{} discards result of {}", keyword, expr_string(e));
                        self.invalid_op(e.span, msg);
                    }
                }
            }
            _ => {
                self.use_expr(e);
                self.invalid_op(e.span, format!("expression in {} must be function call", keyword));
            }
        }
    }

    fn return_stmt(&mut self, stmt: &Stmt, results: &[Expr]) {
        let sig = match self.ctx.sig {
            Some(sig) => sig,
            None => {
                self.use_exprs(results);
                self.invalid_op(stmt.span, "return statement outside function");
                return;
            }
        };

        let result_tuple = match self.ws.types.get(sig) {
            Type::Signature(s) => s.results,
            _ => return,
        };
        let vars = self.ws.tuple_vars(result_tuple).to_vec();

        if results.is_empty() {
            if vars.is_empty() {
                return;
            }
            let named = !self.ws.object(vars[0]).name.is_empty();
            if !named {
                self.error(ErrorKind::TypeMismatch, stmt.span, "not enough return values");
                return;
            }
            if self.conf.allow_over_shadowed_naked_returns {
                return;
            }
            for var in vars {
                let name = self.ws.object(var).name;
                if let Some((_, alt)) = self.ws.lookup_parent(self.ctx.scope, name) {
                    if alt != var {
                        self.invalid_op(stmt.span, format!("result parameter {} not in scope at return", name));
                        let span = self.ws.object(alt).span;
                        self.invalid_op(span, format!("\tinner declaration of {}", name));
                    }
                }
            }
            return;
        }

        if vars.is_empty() {
            self.use_exprs(results);
            self.error(ErrorKind::TypeMismatch, results[0].span, "too many return values");
            return;
        }

        self.init_vars(&vars, results, Some(stmt.span));
    }

    fn branch(&mut self, ctx: StmtCtx, kind: BranchKind, span: Span) {
        match kind {
            BranchKind::Break if !ctx.contains(StmtCtx::BREAK_OK) => {
                self.invalid_op(span, "break is not in a loop, switch, or select");
            }
            BranchKind::Continue if !ctx.contains(StmtCtx::CONTINUE_OK) => {
                self.invalid_op(span, "continue is not in a loop");
            }
            BranchKind::Fallthrough if !ctx.contains(StmtCtx::FALLTHROUGH_OK) => {
                let msg = if ctx.contains(StmtCtx::FINAL_SWITCH_CASE) {
                    "cannot fallthrough final case in switch"
                } else {
                    "fallthrough statement out of place"
                };
                self.invalid_op(span, msg);
            }
            BranchKind::Goto => {
                // A goto always names a label.
                self.invalid_op(span, "goto without label");
            }
            _ => (),
        }
    }

    fn switch(&mut self, ctx: StmtCtx, init: Option<&Stmt>, tag: Option<&Expr>, body: &[CaseClause]) {
        self.simple_stmt(init);

        let untyped_bool = self.ws.types.basic(BasicKind::UntypedBool);
        let x = match tag {
            Some(tag) => {
                let mut x = self.expr(tag);
                self.assignment(&mut x, None, "switch expression");
                if !x.is_invalid() && !self.ws.comparable(x.ty) && !self.ws.has_nil(x.ty) {
                    let msg = format!("cannot switch on {}", self.describe(&x));
                    self.invalid_op(tag.span, msg);
                    x.mode = OperandMode::Invalid;
                }
                x
            }
            None => Operand {
                mode: OperandMode::Constant,
                ty: untyped_bool,
                val: Some(ConstValue::Bool(true)),
                builtin: None,
                expr: None,
            },
        };

        self.check_defaults(body);

        let mut seen: Vec<(ConstValue, TypeId, Span)> = vec![];
        for (i, clause) in body.iter().enumerate() {
            if let Some(list) = &clause.list {
                self.case_values(&x, list, &mut seen);
            }

            let scope = self.open_scope(clause.id, clause.span, "case");
            let mut inner = ctx | StmtCtx::BREAK_OK;
            if i + 1 < body.len() {
                inner |= StmtCtx::FALLTHROUGH_OK;
            } else {
                inner |= StmtCtx::FINAL_SWITCH_CASE;
            }
            self.in_scope(scope, |sess| sess.stmt_list(inner, &clause.body));
        }
    }

    fn check_defaults(&mut self, body: &[CaseClause]) {
        let mut first: Option<Span> = None;
        for clause in body.iter().filter(|c| c.list.is_none()) {
            match first {
                Some(prev) => {
                    self.invalid_op(clause.span, format!("multiple defaults in switch (first at {})", self.fset.position(prev)));
                }
                None => first = Some(clause.span),
            }
        }
    }

    fn case_values(&mut self, x: &Operand, list: &[Expr], seen: &mut Vec<(ConstValue, TypeId, Span)>) {
        for e in list {
            let mut v = self.expr(e);
            if x.is_invalid() || v.is_invalid() {
                continue;
            }
            self.convert_untyped(&mut v, x.ty);
            if v.is_invalid() {
                continue;
            }

            let res = self.comparison(e, BinaryOp::Eq, &v, x);
            if res.is_invalid() {
                continue;
            }

            if let (true, Some(val)) = (v.is_constant(), v.val.clone()) {
                let dup = seen
                    .iter()
                    .find(|(prev, ty, _)| *prev == val && self.ws.identical(*ty, v.ty))
                    .map(|(_, _, span)| *span);
                match dup {
                    Some(prev) => {
                        self.invalid_op(e.span, format!("duplicate case {} in expression switch", expr_string(e)));
                        self.invalid_op(prev, "\tprevious case");
                    }
                    None => seen.push((val, v.ty, e.span)),
                }
            }
        }
    }

    fn type_switch(&mut self, ctx: StmtCtx, init: Option<&Stmt>, assign: &Stmt, body: &[CaseClause]) {
        self.simple_stmt(init);

        let guard = match &assign.kind {
            StmtKind::Expr(e) => type_switch_guard(e).map(|x| (None, x)),
            StmtKind::Assign {
                lhs,
                op: AssignOp::Define,
                rhs,
            } if lhs.len() == 1 && rhs.len() == 1 => match lhs[0].as_ident() {
                Some(name) => type_switch_guard(&rhs[0]).map(|x| (Some((name.name, &lhs[0])), x)),
                None => None,
            },
            _ => None,
        };

        let (lhs, guard) = match guard {
            Some(found) => found,
            None => {
                self.invalid_op(assign.span, "invalid syntax in type switch guard");
                return;
            }
        };

        if let Some((name, e)) = lhs {
            if name == "_" {
                self.invalid_op(e.span, "no new variable on left side of :=");
            }
            self.record_def(e.id, None);
        }

        let x = self.expr(guard);
        if x.is_invalid() {
            return;
        }
        if !self.ws.is_interface(x.ty) {
            let msg = format!("{} is not an interface", self.describe(&x));
            self.invalid_op(guard.span, msg);
            return;
        }

        self.check_defaults(body);

        let mut seen: Vec<(Option<TypeId>, Span)> = vec![];
        let mut clause_vars = vec![];

        for clause in body {
            let types = match &clause.list {
                Some(list) => self.case_types(&x, list, &mut seen),
                None => vec![],
            };

            let scope = self.open_scope(clause.id, clause.span, "case");

            if let Some((name, e)) = lhs {
                let ty = match types.as_slice() {
                    [Some(t)] => *t,
                    _ => x.ty,
                };
                let var = self
                    .ws
                    .new_var(name, e.span, Some(self.pkg), ty, ObjectFlags::IMPLICIT);
                let _ = self.ws.declare(scope, var, crate::workspace::scope::RedeclareMode::Forbid);
                self.record_implicit(clause.id, var);
                clause_vars.push(var);
            }

            self.in_scope(scope, |sess| sess.stmt_list(ctx | StmtCtx::BREAK_OK, &clause.body));
        }

        if let Some((name, e)) = lhs {
            if name != "_" && !self.conf.allow_unused_var {
                let used = clause_vars
                    .iter()
                    .any(|v| self.ws.object(*v).flags.contains(ObjectFlags::USED));
                if !used {
                    self.error(ErrorKind::UnusedVariable, e.span, format!("{} declared but not used", name));
                }
            }
        }
    }

    /// The types of a type switch case; `None` stands for `nil`.
    fn case_types(
        &mut self,
        x: &Operand,
        list: &[Expr],
        seen: &mut Vec<(Option<TypeId>, Span)>,
    ) -> Vec<Option<TypeId>> {
        let mut types = vec![];

        for e in list {
            let t = if self.is_nil_ident(e) {
                self.expr(e);
                None
            } else {
                let t = self.typ(e);
                if self.ws.is_invalid(t) {
                    continue;
                }
                self.type_assertion(x, t, e);
                Some(t)
            };

            let dup = seen
                .iter()
                .find(|(prev, _)| match (prev, t) {
                    (None, None) => true,
                    (Some(a), Some(b)) => self.ws.identical(*a, b),
                    _ => false,
                })
                .map(|(_, span)| *span);

            match dup {
                Some(prev) => {
                    let what = t.map_or_else(|| "nil".to_string(), |t| self.type_str(t));
                    self.invalid_op(e.span, format!("duplicate case {} in type switch", what));
                    self.invalid_op(prev, "\tprevious case");
                }
                None => seen.push((t, e.span)),
            }

            types.push(t);
        }

        types
    }

    fn is_nil_ident(&self, e: &Expr) -> bool {
        match &e.unparen().kind {
            ExprKind::Ident(name) => matches!(
                self.ws.lookup_parent(self.ctx.scope, *name),
                Some((_, obj)) if obj == self.ws.universe.nil
            ),
            _ => false,
        }
    }

    fn range(&mut self, stmt: &Stmt, key: Option<&Expr>, value: Option<&Expr>, define: bool, xe: &Expr) {
        let mut x = self.expr(xe);

        let mut key_ty = None;
        let mut value_ty = None;

        if !x.is_invalid() {
            if self.ws.is_string(x.ty) && self.ws.is_untyped(x.ty) {
                self.assignment(&mut x, None, "range");
            }

            let int = self.ws.types.basic(BasicKind::Int);
            let under = self.ws.underlying(x.ty);

            match self.ws.types.get(under).clone() {
                Type::Basic(_) if self.ws.is_string(under) => {
                    key_ty = Some(int);
                    value_ty = Some(self.ws.types.rune());
                }
                Type::Array(a) => {
                    key_ty = Some(int);
                    value_ty = Some(a.elem);
                }
                Type::Slice(elem) => {
                    key_ty = Some(int);
                    value_ty = Some(elem);
                }
                Type::Pointer(p) if self.array_elem(p).is_some() => {
                    key_ty = Some(int);
                    value_ty = self.array_elem(p);
                }
                Type::Map(m) => {
                    key_ty = Some(m.key);
                    value_ty = Some(m.elem);
                }
                Type::Chan(c) => {
                    key_ty = Some(c.elem);
                    if c.dir == ChanDir::Send {
                        let msg = format!(
                            "invalid operation: range {} receive from send-only channel",
                            self.describe(&x)
                        );
                        self.invalid_op(xe.span, msg);
                    }
                    if let Some(value) = value {
                        let msg = format!("range over {} permits only one iteration variable", self.describe(&x));
                        self.invalid_op(value.span, msg);
                    }
                }
                _ => {
                    let msg = format!("cannot range over {}", self.describe(&x));
                    self.invalid_op(xe.span, msg);
                }
            }
        }

        let targets = [(key, key_ty), (value, value_ty)];

        if define {
            let invalid = self.ws.types.invalid();
            let mut vars = vec![];

            for (lhs, ty) in targets {
                let lhs = match lhs {
                    Some(lhs) => lhs,
                    None => continue,
                };
                match lhs.kind.as_ident() {
                    Some(name) => {
                        let var = self.ws.new_var(*name, lhs.span, Some(self.pkg), ty.unwrap_or(invalid), ObjectFlags::empty());
                        self.record_def(lhs.id, Some(var));
                        vars.push(var);
                    }
                    None => {
                        self.use_expr(lhs);
                        self.invalid_op(lhs.span, format!("non-name {} on left side of :=", expr_string(lhs)));
                    }
                }
            }

            if vars.is_empty() {
                self.invalid_op(stmt.span, "no new variables on left side of :=");
            }
            for var in vars {
                self.declare_local(var);
            }
            return;
        }

        for (lhs, ty) in targets {
            if let (Some(lhs), Some(ty)) = (lhs, ty) {
                let mut op = Operand::new(OperandMode::Value, ty, lhs);
                self.assign_var(lhs, &mut op);
            }
        }
    }

    /// Binds the labels of a function body and checks every labeled branch.
    fn labels(&mut self, body: &[Stmt]) {
        let mut labels = Labels::default();
        self.collect_labels(body, &mut labels);

        if labels.decls.is_empty() && !has_labeled_branch(body) {
            return;
        }

        let mut walker = LabelWalk {
            blocks: vec![],
            enclosing: vec![],
        };
        self.label_branches(body, &mut labels, &mut walker);

        for (name, obj) in &labels.decls {
            if !labels.used.contains(obj) {
                let span = self.ws.object(*obj).span;
                self.error(ErrorKind::UnusedLabel, span, format!("label {} declared but not used", name));
            }
        }
    }

    fn collect_labels(&mut self, stmts: &[Stmt], labels: &mut Labels) {
        for stmt in stmts {
            self.collect_labels_in(stmt, labels);
        }
    }

    fn collect_labels_in(&mut self, stmt: &Stmt, labels: &mut Labels) {
        match &stmt.kind {
            StmtKind::Labeled { label, stmt } => {
                if !label.is_blank() {
                    let obj = self.ws.new_object(NewObject::new(
                        ObjectKind::Label,
                        label.name,
                        label.span,
                        Some(self.pkg),
                    ));
                    self.record_def(label.id, Some(obj));
                    match labels.decls.get(&label.name) {
                        Some(prev) => {
                            let prev_span = self.ws.object(*prev).span;
                            self.error(
                                ErrorKind::Redeclaration,
                                label.span,
                                format!("label {} already declared", label.name),
                            );
                            self.error(
                                ErrorKind::Redeclaration,
                                prev_span,
                                format!("\tother declaration of {}", label.name),
                            );
                        }
                        None => {
                            labels.decls.insert(label.name, obj);
                        }
                    }
                }
                self.collect_labels_in(stmt, labels);
            }
            StmtKind::Block(b) => self.collect_labels(&b.stmts, labels),
            StmtKind::If { then, els, .. } => {
                self.collect_labels(&then.stmts, labels);
                if let Some(els) = els {
                    self.collect_labels_in(els, labels);
                }
            }
            StmtKind::Switch { body, .. } | StmtKind::TypeSwitch { body, .. } => {
                for clause in body {
                    self.collect_labels(&clause.body, labels);
                }
            }
            StmtKind::For { body, .. } | StmtKind::Range { body, .. } => self.collect_labels(&body.stmts, labels),
            _ => (),
        }
    }

    fn label_branches(&mut self, stmts: &[Stmt], labels: &mut Labels, walk: &mut LabelWalk) {
        let declared: HashSet<Ustr> = stmts.iter().filter_map(stmt_label).map(|l| l.name).collect();
        walk.blocks.push(declared);
        for stmt in stmts {
            self.label_branch(stmt, None, labels, walk);
        }
        walk.blocks.pop();
    }

    fn label_branch(&mut self, stmt: &Stmt, label: Option<Ustr>, labels: &mut Labels, walk: &mut LabelWalk) {
        match &stmt.kind {
            StmtKind::Labeled { label, stmt } => {
                self.label_branch(stmt, Some(label.name), labels, walk);
            }
            StmtKind::Branch {
                kind,
                label: Some(target),
            } => self.labeled_branch(stmt.span, *kind, target, labels, walk),
            StmtKind::Block(b) => self.label_branches(&b.stmts, labels, walk),
            StmtKind::If { then, els, .. } => {
                self.label_branches(&then.stmts, labels, walk);
                if let Some(els) = els {
                    self.label_branch(els, None, labels, walk);
                }
            }
            StmtKind::Switch { body, .. } | StmtKind::TypeSwitch { body, .. } => {
                walk.enclosing.push((label, false));
                for clause in body {
                    self.label_branches(&clause.body, labels, walk);
                }
                walk.enclosing.pop();
            }
            StmtKind::For { body, .. } | StmtKind::Range { body, .. } => {
                walk.enclosing.push((label, true));
                self.label_branches(&body.stmts, labels, walk);
                walk.enclosing.pop();
            }
            _ => (),
        }
    }

    fn labeled_branch(&mut self, span: Span, kind: BranchKind, target: &Ident, labels: &mut Labels, walk: &LabelWalk) {
        let obj = match labels.decls.get(&target.name) {
            Some(obj) => *obj,
            None => {
                self.error(
                    ErrorKind::UndefinedIdentifier,
                    target.span,
                    format!("label {} not declared", target.name),
                );
                return;
            }
        };

        self.record_use(target.id, obj);
        labels.used.insert(obj);

        match kind {
            BranchKind::Goto => {
                if !walk.blocks.iter().any(|b| b.contains(&target.name)) {
                    self.invalid_op(span, format!("goto {} jumps into block", target.name));
                }
            }
            BranchKind::Break | BranchKind::Continue => {
                let loop_only = kind == BranchKind::Continue;
                let valid = walk
                    .enclosing
                    .iter()
                    .any(|(l, is_loop)| *l == Some(target.name) && (*is_loop || !loop_only));
                if !valid {
                    let keyword = if loop_only { "continue" } else { "break" };
                    self.invalid_op(target.span, format!("invalid {} label {}", keyword, target.name));
                }
            }
            BranchKind::Fallthrough => {
                self.invalid_op(span, "fallthrough statement out of place");
            }
        }
    }

    fn array_elem(&self, ty: TypeId) -> Option<TypeId> {
        match self.ws.types.get(self.ws.underlying(ty)) {
            Type::Array(a) => Some(a.elem),
            _ => None,
        }
    }

    fn is_terminating_list(&self, stmts: &[Stmt], label: Option<Ustr>) -> bool {
        match trim_trailing_empty(stmts).last() {
            Some(last) => self.is_terminating(last, label),
            None => false,
        }
    }

    /// Whether control cannot flow past `stmt`.
    fn is_terminating(&self, stmt: &Stmt, label: Option<Ustr>) -> bool {
        match &stmt.kind {
            StmtKind::Return(_) => true,
            StmtKind::Branch { kind, .. } => matches!(kind, BranchKind::Goto | BranchKind::Fallthrough),
            StmtKind::Expr(e) => match &e.unparen().kind {
                ExprKind::Call { fun, .. } => self.builtin_of(fun) == Some(BuiltinId::Panic),
                _ => false,
            },
            StmtKind::Labeled { label, stmt } => self.is_terminating(stmt, Some(label.name)),
            StmtKind::Block(b) => self.is_terminating_list(&b.stmts, None),
            StmtKind::If { then, els, .. } => match els {
                Some(els) => self.is_terminating_list(&then.stmts, None) && self.is_terminating(els, None),
                None => false,
            },
            StmtKind::Switch { body, .. } | StmtKind::TypeSwitch { body, .. } => {
                body.iter().any(|c| c.list.is_none())
                    && body
                        .iter()
                        .all(|c| self.is_terminating_list(&c.body, None) && !has_break_list(&c.body, label, true))
            }
            StmtKind::For { cond: None, body, .. } => !has_break_list(&body.stmts, label, true),
            _ => false,
        }
    }

    /// Reports unused local variables of `scope` and its nested blocks.
    /// Function literals report their own.
    pub fn unused_vars(&mut self, scope: ScopeId) {
        if self.conf.allow_unused_var {
            return;
        }

        let mut unused = vec![];
        self.collect_unused(scope, &mut unused);
        unused.sort_by_key(|(span, _)| *span);

        for (span, name) in unused {
            self.error(ErrorKind::UnusedVariable, span, format!("{} declared but not used", name));
        }
    }

    fn collect_unused(&self, scope: ScopeId, out: &mut Vec<(Span, Ustr)>) {
        let scope = self.ws.scope(scope);
        let skip = ObjectFlags::USED | ObjectFlags::IS_PARAM | ObjectFlags::PKG_LEVEL | ObjectFlags::IMPLICIT;

        for obj in scope.elems.values() {
            let obj = self.ws.object(*obj);
            if obj.kind == ObjectKind::Var && !obj.flags.intersects(skip) && obj.name != "_" {
                out.push((obj.span, obj.name));
            }
        }

        for child in &scope.children {
            if !self.ws.scope(*child).is_func {
                self.collect_unused(*child, out);
            }
        }
    }
}

#[derive(Default)]
struct Labels {
    decls: IndexMap<Ustr, ObjectId>,
    used: HashSet<ObjectId>,
}

struct LabelWalk {
    /// Labels declared directly in each enclosing statement list.
    blocks: Vec<HashSet<Ustr>>,
    /// Enclosing breakable statements: their label and whether they loop.
    enclosing: Vec<(Option<Ustr>, bool)>,
}

fn has_results(sess: &CheckSess, results: TypeId) -> bool {
    sess.ws.tuple_len(results) > 0
}

fn trim_trailing_empty(stmts: &[Stmt]) -> &[Stmt] {
    let mut end = stmts.len();
    while end > 0 && matches!(stmts[end - 1].kind, StmtKind::Empty) {
        end -= 1;
    }
    &stmts[..end]
}

fn stmt_label(stmt: &Stmt) -> Option<&Ident> {
    match &stmt.kind {
        StmtKind::Labeled { label, .. } if !label.is_blank() => Some(label),
        _ => None,
    }
}

fn type_switch_guard(e: &Expr) -> Option<&Expr> {
    match &e.unparen().kind {
        ExprKind::TypeAssert { x, ty: None } => Some(x),
        _ => None,
    }
}

fn has_labeled_branch(stmts: &[Stmt]) -> bool {
    stmts.iter().any(|s| match &s.kind {
        StmtKind::Branch { label: Some(_), .. } => true,
        StmtKind::Labeled { stmt, .. } => has_labeled_branch(std::slice::from_ref(stmt)),
        StmtKind::Block(b) => has_labeled_branch(&b.stmts),
        StmtKind::If { then, els, .. } => {
            has_labeled_branch(&then.stmts) || els.as_deref().map_or(false, |e| has_labeled_branch(std::slice::from_ref(e)))
        }
        StmtKind::Switch { body, .. } | StmtKind::TypeSwitch { body, .. } => {
            body.iter().any(|c| has_labeled_branch(&c.body))
        }
        StmtKind::For { body, .. } | StmtKind::Range { body, .. } => has_labeled_branch(&body.stmts),
        _ => false,
    })
}

fn has_break_list(stmts: &[Stmt], label: Option<Ustr>, implicit: bool) -> bool {
    stmts.iter().any(|s| has_break(s, label, implicit))
}

/// Whether `stmt` contains a break out of the statement labeled `label`;
/// with `implicit` an unlabeled break counts as well.
fn has_break(stmt: &Stmt, label: Option<Ustr>, implicit: bool) -> bool {
    match &stmt.kind {
        StmtKind::Branch {
            kind: BranchKind::Break,
            label: target,
        } => match target {
            None => implicit,
            Some(target) => Some(target.name) == label,
        },
        StmtKind::Labeled { stmt, .. } => has_break(stmt, label, implicit),
        StmtKind::Block(b) => has_break_list(&b.stmts, label, implicit),
        StmtKind::If { then, els, .. } => {
            has_break_list(&then.stmts, label, implicit)
                || els.as_deref().map_or(false, |e| has_break(e, label, implicit))
        }
        // Unlabeled breaks inside nested breakable statements target those.
        StmtKind::Switch { body, .. } | StmtKind::TypeSwitch { body, .. } => {
            label.is_some() && body.iter().any(|c| has_break_list(&c.body, label, false))
        }
        StmtKind::For { body, .. } | StmtKind::Range { body, .. } => {
            label.is_some() && has_break_list(&body.stmts, label, false)
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::build::AstBuilder;

    #[test]
    fn endless_loop_without_break_terminates() {
        let mut b = AstBuilder::new();
        let body = b.block(vec![]);
        let forever = b.for_(None, None, None, body);
        assert!(!has_break(&forever, None, true));

        let brk = b.branch(BranchKind::Break, None);
        let body = b.block(vec![brk]);
        let with_break = b.for_(None, None, None, body);
        let list = std::slice::from_ref(&with_break);
        // The break inside targets the inner loop, not an outer statement.
        assert!(!has_break_list(list, None, true));
        assert!(!has_break_list(list, Some(ustr::ustr("outer")), true));
    }

    #[test]
    fn labeled_break_escapes_nested_statements() {
        let mut b = AstBuilder::new();
        let brk = b.branch(BranchKind::Break, Some("outer"));
        let body = b.block(vec![brk]);
        let inner = b.for_(None, None, None, body);

        assert!(has_break(&inner, Some(ustr::ustr("outer")), true));
        assert!(!has_break(&inner, Some(ustr::ustr("other")), true));
    }

    #[test]
    fn trailing_empty_statements_are_ignored() {
        let mut b = AstBuilder::new();
        let ret = b.ret(vec![]);
        let empty = b.block_stmt(vec![]);
        let stmts = vec![ret, Stmt { kind: StmtKind::Empty, ..empty.clone() }, Stmt { kind: StmtKind::Empty, ..empty }];
        assert_eq!(trim_trailing_empty(&stmts).len(), 1);
    }
}
