mod assign;
mod builtins;
mod call;
mod decl;
mod expr;
mod import;
mod init_order;
mod operand;
mod resolver;
mod stmt;
mod typexpr;
mod unused;

use crate::{
    ast::{Block, Expr, File, FuncDecl, NodeId, Stmt, TypeSpec},
    common::path::package_name_for_path,
    config::Config,
    constant::ConstValue,
    error::{Error, ErrorKind},
    info::{DeclSite, Info, OperandMode, Selection, TypeAndValue},
    span::{FileSet, Span},
    types::TypeId,
    workspace::{object::ObjectId, package::PackageId, scope::ScopeId, Workspace},
};
use indexmap::IndexSet;
use std::collections::{HashMap, HashSet};
use ustr::Ustr;

pub(crate) use operand::Operand;

/// The state a package keeps between incremental invocations: everything
/// needed to resolve references to earlier batches and to extend the result
/// tables instead of starting over.
#[derive(Debug, Clone)]
pub struct Checker {
    pkg: PackageId,
    info: Info,
    obj_map: HashMap<ObjectId, DeclInfo>,
    file_scopes: Vec<ScopeId>,
    /// Packages imported so far, by (path, importing directory). Filled only
    /// when import caching is on.
    imports: HashMap<(Ustr, Ustr), PackageId>,
    /// Methods whose receiver type has not been declared yet, by type name.
    methods: HashMap<Ustr, Vec<ObjectId>>,
    /// Variables that already have an entry in the initialization order.
    ordered: HashSet<ObjectId>,
    decl_sites: HashMap<Ustr, DeclSite>,
}

/// A package-level declaration, kept around so that objects can be resolved
/// lazily, possibly from a later batch.
#[derive(Debug, Clone)]
pub(crate) struct DeclInfo {
    pub file_scope: ScopeId,
    pub node: NodeId,
    pub kind: DeclKind,
    /// Package-level objects the declaration refers to.
    pub deps: IndexSet<ObjectId>,
}

#[derive(Debug, Clone)]
pub(crate) enum DeclKind {
    Const {
        ty: Option<Expr>,
        init: Option<Expr>,
        iota: i128,
    },
    /// `lhs` holds every variable initialized by `init`: the object itself,
    /// or all names of an n:1 declaration.
    Var {
        lhs: Vec<ObjectId>,
        ty: Option<Expr>,
        init: Option<Expr>,
    },
    Type(TypeSpec),
    Func(FuncDecl),
}

impl DeclKind {
    pub fn has_init(&self) -> bool {
        matches!(self, DeclKind::Var { init: Some(_), .. })
    }
}

impl Checker {
    /// A checker for `pkg` that fills in `info`.
    pub fn new(pkg: PackageId, info: Info) -> Self {
        Self {
            pkg,
            info,
            obj_map: HashMap::new(),
            file_scopes: vec![],
            imports: HashMap::new(),
            methods: HashMap::new(),
            ordered: HashSet::new(),
            decl_sites: HashMap::new(),
        }
    }

    pub fn package(&self) -> PackageId {
        self.pkg
    }

    pub fn info(&self) -> &Info {
        &self.info
    }

    pub fn info_mut(&mut self) -> &mut Info {
        &mut self.info
    }

    pub fn into_info(self) -> Info {
        self.info
    }

    /// The file scopes of every batch checked so far.
    pub fn file_scopes(&self) -> &[ScopeId] {
        &self.file_scopes
    }

    /// The latest declaration of a package-level name.
    pub fn decl_site(&self, name: &str) -> Option<DeclSite> {
        self.decl_sites.get(&ustr::ustr(name)).copied()
    }

    /// Checks one batch of files against the package. Declarations of earlier
    /// batches stay visible and are not checked again.
    pub fn files(
        &mut self,
        conf: &mut Config,
        ws: &mut Workspace,
        fset: &FileSet,
        files: &[File],
        depth: usize,
    ) -> Result<(), Error> {
        let _span = tracing::debug_span!(
            "check_files",
            pkg = %ws.package(self.pkg).path,
            files = files.len(),
            depth
        )
        .entered();

        let mut sess = CheckSess::new(ws, conf, fset, self, depth);
        // A bail-out has already been recorded as the first error.
        let _ = sess.start(files);
        sess.finish()
    }
}

impl Config {
    /// Type checks `files` as (part of) the package at `path`.
    ///
    /// Without `pkg` a new package is created and `prelude` runs on it before
    /// anything else. Without `checker` a new one is created that fills in
    /// `info`; otherwise `info` is ignored and the checker's own tables grow.
    /// Returns the package, the checker to pass to the next invocation and
    /// the first hard error.
    #[allow(clippy::too_many_arguments)]
    pub fn check(
        &mut self,
        ws: &mut Workspace,
        fset: &FileSet,
        path: &str,
        pkg: Option<PackageId>,
        checker: Option<Checker>,
        files: &[File],
        info: Info,
        prelude: Option<&mut dyn FnMut(&mut Workspace, PackageId)>,
        depth: usize,
    ) -> (PackageId, Checker, Result<(), Error>) {
        let pkg = match pkg {
            Some(pkg) => pkg,
            None => {
                let pkg = ws.new_package(path, package_name_for_path(path));
                if let Some(prelude) = prelude {
                    prelude(ws, pkg);
                }
                pkg
            }
        };

        let mut checker = checker.unwrap_or_else(|| Checker::new(pkg, info));
        let result = checker.files(self, ws, fset, files, depth + 1);
        (pkg, checker, result)
    }
}

/// Returned through `?` once checking has to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Bailed;

pub(crate) type CheckResult<T = ()> = Result<T, Bailed>;

/// Where an expression or statement is being checked.
#[derive(Debug, Clone, Default)]
pub(crate) struct Context {
    pub scope: ScopeId,
    /// The package-level object whose declaration is being checked.
    pub decl: Option<ObjectId>,
    /// The value of `iota` inside a constant declaration.
    pub iota: Option<ConstValue>,
    /// The signature of the enclosing function.
    pub sig: Option<TypeId>,
    /// The scope holding the parameters of the enclosing function.
    pub func_scope: Option<ScopeId>,
    /// Checking a standalone top-level statement.
    pub top_level: bool,
}

pub(crate) enum Delayed {
    Body {
        name: Ustr,
        decl: Option<ObjectId>,
        sig: TypeId,
        body: Block,
        file_scope: ScopeId,
    },
    Stmt {
        stmt: Stmt,
        file_scope: ScopeId,
    },
}

pub(crate) struct DotImport {
    pub file_scope: ScopeId,
    pub pkg: PackageId,
    pub path: Ustr,
    pub span: Span,
    pub used: bool,
}

/// One invocation of the checker over a batch of files.
pub(crate) struct CheckSess<'s> {
    pub ws: &'s mut Workspace,
    pub conf: &'s mut Config,
    pub fset: &'s FileSet,
    pub chk: &'s mut Checker,
    pub pkg: PackageId,
    pub depth: usize,

    pub first_err: Option<Error>,
    pub hard_errors: usize,
    pub bailed: bool,

    pub ctx: Context,
    // Objects on the path of the current lazy resolution
    pub obj_path: Vec<ObjectId>,

    // Package-level objects declared by this batch, in source order
    pub batch: Vec<ObjectId>,
    pub stmts: Vec<Delayed>,
    pub bodies: Vec<Delayed>,

    // Import names declared by this batch
    pub batch_imports: Vec<ObjectId>,
    pub dot_imports: Vec<DotImport>,
    // Packages that only exist as a stand-in for a failed import
    pub fake_pkgs: HashSet<PackageId>,
    // Bindings displaced by redeclarations of this batch
    pub replaced: Vec<ObjectId>,
}

impl<'s> CheckSess<'s> {
    pub fn new(
        ws: &'s mut Workspace,
        conf: &'s mut Config,
        fset: &'s FileSet,
        chk: &'s mut Checker,
        depth: usize,
    ) -> Self {
        let pkg = chk.pkg;
        let scope = ws.package(pkg).scope;

        Self {
            ws,
            conf,
            fset,
            chk,
            pkg,
            depth,
            first_err: None,
            hard_errors: 0,
            bailed: false,
            ctx: Context {
                scope,
                ..Default::default()
            },
            obj_path: vec![],
            batch: vec![],
            stmts: vec![],
            bodies: vec![],
            batch_imports: vec![],
            dot_imports: vec![],
            fake_pkgs: HashSet::new(),
            replaced: vec![],
        }
    }

    pub fn start(&mut self, files: &[File]) -> CheckResult {
        if self.depth > self.conf.max_import_depth {
            let span = files.first().map_or_else(Span::unknown, |f| f.span);
            self.error(
                ErrorKind::Import,
                span,
                format!(
                    "import depth {} exceeds the maximum of {}",
                    self.depth, self.conf.max_import_depth
                ),
            );
            return Err(Bailed);
        }

        self.collect_objects(files)?;
        self.package_objects()?;
        self.process_stmts()?;
        self.process_bodies()?;
        self.init_order()?;
        self.unused_imports();

        Ok(())
    }

    fn finish(mut self) -> Result<(), Error> {
        self.settle_unresolved();

        let complete = self.hard_errors == 0;
        self.ws.package_mut(self.pkg).complete = complete;

        tracing::debug!(
            complete,
            hard_errors = self.hard_errors,
            objects = self.batch.len(),
            "batch checked"
        );

        match self.first_err.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Objects of a batch that was abandoned halfway are given the invalid
    /// type so that later batches see them as resolved.
    fn settle_unresolved(&mut self) {
        use crate::workspace::object::Color;

        let invalid = self.ws.types.invalid();
        for obj in self.batch.iter().chain(self.obj_path.iter()) {
            let obj = self.ws.object_mut(*obj);
            if obj.color != Color::Black {
                obj.color = Color::Black;
                obj.ty.get_or_insert(invalid);
            }
        }
        self.obj_path.clear();
    }

    /// Reports an error. Without a sink the first hard error stops the check.
    pub fn error(&mut self, kind: ErrorKind, span: Span, msg: impl Into<String>) {
        if self.bailed {
            return;
        }

        let err = Error::new(self.fset, kind, span, msg);

        if !err.soft {
            self.hard_errors += 1;
            if self.first_err.is_none() {
                self.first_err = Some(err.clone());
            }
        }

        match self.conf.error.as_mut() {
            Some(sink) => sink(&err),
            None if err.soft => tracing::debug!(%err, "soft error"),
            None => {
                tracing::debug!(%err, "stopping at first error");
                self.bailed = true;
            }
        }
    }

    pub fn invalid_op(&mut self, span: Span, msg: impl Into<String>) {
        self.error(ErrorKind::InvalidOperation, span, msg)
    }

    pub fn checkpoint(&self) -> CheckResult {
        if self.bailed {
            Err(Bailed)
        } else {
            Ok(())
        }
    }

    /// Runs `f` in context `ctx`, restoring the current one afterwards.
    pub fn with_context<T>(&mut self, ctx: Context, f: impl FnOnce(&mut Self) -> T) -> T {
        let saved = std::mem::replace(&mut self.ctx, ctx);
        let result = f(self);
        self.ctx = saved;
        result
    }

    pub fn pkg_scope(&self) -> ScopeId {
        self.ws.package(self.pkg).scope
    }

    pub fn type_str(&self, ty: TypeId) -> String {
        self.ws.type_string(ty, Some(self.pkg))
    }

    pub fn record_operand(&mut self, x: &Operand) {
        if let Some(e) = x.expr {
            let value = if x.mode == OperandMode::Constant {
                x.val.clone()
            } else {
                None
            };
            self.record_type_and_value(e.id, x.mode, x.ty, value);
        }
    }

    pub fn record_type_and_value(
        &mut self,
        node: NodeId,
        mode: OperandMode,
        ty: TypeId,
        value: Option<ConstValue>,
    ) {
        if mode == OperandMode::Invalid {
            return;
        }
        if let Some(types) = self.chk.info.types.as_mut() {
            types.insert(node, TypeAndValue { mode, ty, value });
        }
    }

    pub fn record_def(&mut self, ident: NodeId, obj: Option<ObjectId>) {
        if let Some(defs) = self.chk.info.defs.as_mut() {
            defs.insert(ident, obj);
        }
    }

    pub fn record_use(&mut self, ident: NodeId, obj: ObjectId) {
        if let Some(uses) = self.chk.info.uses.as_mut() {
            uses.insert(ident, obj);
        }
    }

    pub fn record_implicit(&mut self, node: NodeId, obj: ObjectId) {
        if let Some(implicits) = self.chk.info.implicits.as_mut() {
            implicits.insert(node, obj);
        }
    }

    pub fn record_selection(&mut self, node: NodeId, sel: Selection) {
        if let Some(selections) = self.chk.info.selections.as_mut() {
            selections.insert(node, sel);
        }
    }

    pub fn record_scope(&mut self, node: NodeId, scope: ScopeId) {
        if let Some(scopes) = self.chk.info.scopes.as_mut() {
            scopes.insert(node, scope);
        }
    }

    /// Records that the declaration being checked refers to `obj`.
    pub fn add_dep(&mut self, obj: ObjectId) {
        if let Some(decl) = self.ctx.decl {
            if let Some(info) = self.chk.obj_map.get_mut(&decl) {
                info.deps.insert(obj);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::build::AstBuilder;
    use std::{cell::RefCell, rc::Rc};

    #[test]
    fn check_creates_package_and_runs_prelude_once() {
        let mut ws = Workspace::new();
        let fset = FileSet::new();
        let mut conf = Config::new();
        let mut b = AstBuilder::new();
        let file = b.file("repl.go", "main", vec![]);

        let mut calls = 0;
        let mut prelude = |_: &mut Workspace, _: PackageId| calls += 1;
        let (pkg, checker, result) = conf.check(
            &mut ws,
            &fset,
            "",
            None,
            None,
            &[file.clone()],
            Info::all(),
            Some(&mut prelude),
            0,
        );
        assert!(result.is_ok());
        assert_eq!(ws.package(pkg).name.as_str(), "main");
        assert!(ws.package(pkg).complete);

        let (again, _, result) = conf.check(
            &mut ws,
            &fset,
            "",
            Some(pkg),
            Some(checker),
            &[file],
            Info::default(),
            None,
            0,
        );
        assert!(result.is_ok());
        assert_eq!(again, pkg);
        assert_eq!(calls, 1);
    }

    #[test]
    fn exceeding_import_depth_is_a_hard_error() {
        let mut ws = Workspace::new();
        let fset = FileSet::new();
        let seen = Rc::new(RefCell::new(vec![]));
        let sink = seen.clone();
        let mut conf = Config {
            max_import_depth: 2,
            error: Some(Box::new(move |err: &Error| sink.borrow_mut().push(err.kind))),
            ..Default::default()
        };
        let mut b = AstBuilder::new();
        let file = b.file("a.go", "a", vec![]);

        let (pkg, _, result) =
            conf.check(&mut ws, &fset, "a", None, None, &[file], Info::default(), None, 5);
        assert_eq!(result.map_err(|e| e.kind), Err(ErrorKind::Import));
        assert_eq!(*seen.borrow(), vec![ErrorKind::Import]);
        assert!(!ws.package(pkg).complete);
    }
}
