use gotypes::{
    ast::{build::AstBuilder, AssignOp, BinaryOp, BranchKind, File},
    check::Checker,
    constant::ConstValue,
    types::{BasicKind, Type},
    workspace::package::PackageId,
    Config, Error, ErrorKind, FileSet, ImportFailure, ImportMode, Importer, ImporterFrom, Info,
    OperandMode, Workspace,
};
use std::{cell::RefCell, rc::Rc};

type Errors = Rc<RefCell<Vec<Error>>>;

fn collecting_config() -> (Config, Errors) {
    let errors: Errors = Rc::new(RefCell::new(vec![]));
    let sink = errors.clone();
    let conf = Config {
        error: Some(Box::new(move |err: &Error| sink.borrow_mut().push(err.clone()))),
        ..Default::default()
    };
    (conf, errors)
}

fn check(
    conf: &mut Config,
    ws: &mut Workspace,
    files: &[File],
    pkg: Option<PackageId>,
    checker: Option<Checker>,
) -> (PackageId, Checker, Result<(), Error>) {
    let fset = FileSet::new();
    conf.check(ws, &fset, "main", pkg, checker, files, Info::all(), None, 0)
}

fn kinds(errors: &Errors) -> Vec<ErrorKind> {
    errors.borrow().iter().map(|e| e.kind).collect()
}

fn messages(errors: &Errors) -> Vec<String> {
    errors.borrow().iter().map(|e| e.msg.clone()).collect()
}

#[test]
fn constant_overflow_marks_package_incomplete() {
    let mut ws = Workspace::new();
    let mut conf = Config::new();
    let mut b = AstBuilder::new();

    let one = b.int(1);
    let hundred = b.int(100);
    let shift = b.binary(BinaryOp::Shl, one, hundred);
    let int32 = b.ident("int32");
    let decl = b.const_(&["X"], Some(int32), vec![shift]);
    let file = b.file("a.go", "main", vec![decl]);

    let (pkg, _, result) = check(&mut conf, &mut ws, &[file], None, None);

    assert_eq!(result.map_err(|e| e.kind), Err(ErrorKind::ConstantOverflow));
    assert!(!ws.package(pkg).complete);
}

#[test]
fn init_order_follows_dependencies_across_files() {
    let mut ws = Workspace::new();
    let mut conf = Config::new();
    let mut b = AstBuilder::new();

    let x = b.ident("x");
    let one = b.int(1);
    let sum = b.binary(BinaryOp::Add, x, one);
    let y = b.var(&["y"], None, vec![sum]);
    let first = b.file("a.go", "main", vec![y]);

    b.set_file(1);
    let two = b.int(2);
    let x = b.var(&["x"], None, vec![two]);
    let second = b.file("b.go", "main", vec![x]);

    let (_, checker, result) = check(&mut conf, &mut ws, &[first, second], None, None);
    assert!(result.is_ok());

    let order: Vec<String> = checker
        .info()
        .init_order()
        .iter()
        .map(|init| init.display(&ws))
        .collect();
    assert_eq!(order, vec!["x = 2", "y = x + 1"]);
}

#[test]
fn redeclaration_in_a_later_batch_replaces_the_binding() {
    let mut ws = Workspace::new();
    let mut conf = Config {
        allow_redeclaration: true,
        ..Default::default()
    };
    let mut b = AstBuilder::new();

    let one = b.int(1);
    let a = b.var(&["a"], None, vec![one]);
    let first = b.file("1.go", "main", vec![a]);
    let (pkg, checker, result) = check(&mut conf, &mut ws, &[first], None, None);
    assert!(result.is_ok());
    let old = ws.pkg_lookup(pkg, "a").unwrap();

    let two = b.int(2);
    let a = b.var(&["a"], None, vec![two]);
    let second = b.file("2.go", "main", vec![a]);
    let (again, checker, result) = check(&mut conf, &mut ws, &[second], Some(pkg), Some(checker));
    assert!(result.is_ok());
    assert_eq!(again, pkg);

    let new = ws.pkg_lookup(pkg, "a").unwrap();
    assert_ne!(old, new);

    let log = checker.info().new_code.as_ref().unwrap();
    let entry = log.iter().find(|c| c.obj == Some(new)).unwrap();
    assert_eq!(entry.replaced, Some(old));
    assert!(entry.is_pkg_scope);

    let order: Vec<String> = checker
        .info()
        .init_order()
        .iter()
        .map(|init| init.display(&ws))
        .collect();
    assert_eq!(order, vec!["a = 2"]);
}

#[test]
fn redeclaration_is_an_error_unless_allowed() {
    let mut ws = Workspace::new();
    let (mut conf, errors) = collecting_config();
    let mut b = AstBuilder::new();

    let one = b.int(1);
    let first = b.var(&["a"], None, vec![one]);
    let two = b.int(2);
    let second = b.var(&["a"], None, vec![two]);
    let file = b.file("a.go", "main", vec![first, second]);

    let (pkg, _, result) = check(&mut conf, &mut ws, &[file], None, None);
    assert_eq!(result.map_err(|e| e.kind), Err(ErrorKind::Redeclaration));
    assert!(kinds(&errors).contains(&ErrorKind::Redeclaration));
    assert!(!ws.package(pkg).complete);
}

#[test]
fn mutually_recursive_interfaces_resolve() {
    let mut ws = Workspace::new();
    let mut conf = Config::new();
    let mut b = AstBuilder::new();

    // type A interface { M() B }
    let ret_b = b.ident("B");
    let ret_b = b.field(&[], ret_b);
    let m = b.func_type(vec![], vec![ret_b]);
    let m = b.func_type_expr(m);
    let m = b.field(&["M"], m);
    let a_ty = b.interface_type(vec![m]);
    let a = b.type_("A", a_ty);

    // type B interface { M() B; N() A }
    let ret_b = b.ident("B");
    let ret_b = b.field(&[], ret_b);
    let m = b.func_type(vec![], vec![ret_b]);
    let m = b.func_type_expr(m);
    let m = b.field(&["M"], m);
    let ret_a = b.ident("A");
    let ret_a = b.field(&[], ret_a);
    let n = b.func_type(vec![], vec![ret_a]);
    let n = b.func_type_expr(n);
    let n = b.field(&["N"], n);
    let b_ty = b.interface_type(vec![m, n]);
    let b_decl = b.type_("B", b_ty);

    let file = b.file("a.go", "main", vec![a, b_decl]);
    let (pkg, _, result) = check(&mut conf, &mut ws, &[file], None, None);
    assert!(result.is_ok());

    let a = ws.obj_type(ws.pkg_lookup(pkg, "A").unwrap());
    let b = ws.obj_type(ws.pkg_lookup(pkg, "B").unwrap());
    assert!(ws.implements(a, a));
    assert!(ws.implements(b, a));
    assert!(!ws.implements(a, b));
}

struct FailingImporter;

impl Importer for FailingImporter {
    fn import(&mut self, _: &mut Workspace, path: &str, _: usize) -> Result<PackageId, ImportFailure> {
        Err(ImportFailure::new(format!("cannot find package {:?}", path)))
    }
}

#[test]
fn failed_import_does_not_cascade() {
    let mut ws = Workspace::new();
    let (mut conf, errors) = collecting_config();
    conf.importer = Some(Box::new(FailingImporter));
    let mut b = AstBuilder::new();

    let import = b.import("nonexistent/pkg");
    let thing = b.qualified("pkg", "Thing");
    let v = b.var(&["v"], None, vec![thing]);
    let file = b.file("a.go", "main", vec![import, v]);

    let (pkg, _, result) = check(&mut conf, &mut ws, &[file], None, None);
    assert_eq!(result.map_err(|e| e.kind), Err(ErrorKind::Import));
    assert_eq!(kinds(&errors), vec![ErrorKind::Import]);
    assert!(!ws.package(pkg).complete);
}

#[test]
fn pseudo_package_c_needs_the_flag() {
    let build = |b: &mut AstBuilder| {
        let import = b.import("C");
        let anything = b.qualified("C", "anything");
        let v = b.var(&["v"], None, vec![anything]);
        b.file("a.go", "main", vec![import, v])
    };

    let mut ws = Workspace::new();
    let (mut conf, errors) = collecting_config();
    conf.fake_import_c = true;
    let mut b = AstBuilder::new();
    let file = build(&mut b);
    let (pkg, _, result) = check(&mut conf, &mut ws, &[file], None, None);
    assert!(result.is_ok(), "{:?}", messages(&errors));
    let v = ws.pkg_lookup(pkg, "v").unwrap();
    assert!(ws.is_invalid(ws.obj_type(v)));

    let mut ws = Workspace::new();
    let (mut conf, errors) = collecting_config();
    let mut b = AstBuilder::new();
    let file = build(&mut b);
    let (_, _, result) = check(&mut conf, &mut ws, &[file], None, None);
    assert!(result.is_err());
    assert!(kinds(&errors).contains(&ErrorKind::UndefinedIdentifier));
}

#[test]
fn initialization_cycle_through_a_function() {
    let mut ws = Workspace::new();
    let (mut conf, errors) = collecting_config();
    let mut b = AstBuilder::new();

    // var a = f()
    let f = b.ident("f");
    let call = b.call(f, vec![]);
    let a = b.var(&["a"], None, vec![call]);

    // func f() int { return a }
    let a_ref = b.ident("a");
    let ret = b.ret(vec![a_ref]);
    let body = b.block(vec![ret]);
    let int = b.ident("int");
    let result = b.field(&[], int);
    let ft = b.func_type(vec![], vec![result]);
    let f = b.func("f", ft, Some(body));

    let file = b.file("a.go", "main", vec![a, f]);
    let (_, checker, result) = check(&mut conf, &mut ws, &[file], None, None);

    assert_eq!(result.map_err(|e| e.kind), Err(ErrorKind::CyclicDeclaration));
    assert_eq!(messages(&errors)[0], "initialization cycle for a");
    assert!(checker.info().init_order().is_empty());
}

#[test]
fn function_bodies_report_missing_returns_and_unused_variables() {
    let mut ws = Workspace::new();
    let (mut conf, errors) = collecting_config();
    let mut b = AstBuilder::new();

    // func f() int { x := 1 }
    let one = b.int(1);
    let define = b.define(&["x"], vec![one]);
    let body = b.block(vec![define]);
    let int = b.ident("int");
    let result = b.field(&[], int);
    let ft = b.func_type(vec![], vec![result]);
    let f = b.func("f", ft, Some(body));

    let file = b.file("a.go", "main", vec![f]);
    let (_, _, result) = check(&mut conf, &mut ws, &[file], None, None);

    assert_eq!(result.map_err(|e| e.kind), Err(ErrorKind::TypeMismatch));
    assert_eq!(
        messages(&errors),
        vec!["missing return".to_string(), "x declared but not used".to_string()]
    );
    let soft: Vec<bool> = errors.borrow().iter().map(|e| e.soft).collect();
    assert_eq!(soft, vec![false, true]);
}

#[test]
fn unused_variables_can_be_tolerated() {
    let mut ws = Workspace::new();
    let (mut conf, errors) = collecting_config();
    conf.allow_unused_var = true;
    let mut b = AstBuilder::new();

    let one = b.int(1);
    let define = b.define(&["x"], vec![one]);
    let body = b.block(vec![define]);
    let ft = b.func_type(vec![], vec![]);
    let f = b.func("f", ft, Some(body));

    let file = b.file("a.go", "main", vec![f]);
    let (_, _, result) = check(&mut conf, &mut ws, &[file], None, None);
    assert!(result.is_ok());
    assert!(errors.borrow().is_empty());
}

#[test]
fn branches_need_an_enclosing_statement() {
    let mut ws = Workspace::new();
    let (mut conf, errors) = collecting_config();
    let mut b = AstBuilder::new();

    // func f() { break; for { continue }; L: for { break L }; goto M }
    let brk = b.branch(BranchKind::Break, None);
    let cont = b.branch(BranchKind::Continue, None);
    let loop_body = b.block(vec![cont]);
    let plain_loop = b.for_(None, None, None, loop_body);
    let brk_l = b.branch(BranchKind::Break, Some("L"));
    let labeled_body = b.block(vec![brk_l]);
    let labeled_loop = b.for_(None, None, None, labeled_body);
    let labeled = b.labeled("L", labeled_loop);
    let goto = b.branch(BranchKind::Goto, Some("M"));
    let body = b.block(vec![brk, plain_loop, labeled, goto]);
    let ft = b.func_type(vec![], vec![]);
    let f = b.func("f", ft, Some(body));

    let file = b.file("a.go", "main", vec![f]);
    check(&mut conf, &mut ws, &[file], None, None);

    assert_eq!(
        messages(&errors),
        vec![
            "break is not in a loop, switch, or select".to_string(),
            "label M not declared".to_string(),
        ]
    );
}

#[test]
fn type_switch_binds_the_case_type() {
    let mut ws = Workspace::new();
    let (mut conf, errors) = collecting_config();
    let mut b = AstBuilder::new();

    // func f(x interface{}) int { switch v := x.(type) { case int: return v; default: return 0 } }
    let v = b.ident("v");
    let ret_v = b.ret(vec![v]);
    let int = b.ident("int");
    let int_case = b.case(Some(vec![int]), vec![ret_v]);
    let zero = b.int(0);
    let ret_zero = b.ret(vec![zero]);
    let default = b.case(None, vec![ret_zero]);
    let x = b.ident("x");
    let switch = b.type_switch(Some("v"), x, vec![int_case, default]);
    let body = b.block(vec![switch]);

    let any = b.interface_type(vec![]);
    let param = b.field(&["x"], any);
    let int = b.ident("int");
    let result = b.field(&[], int);
    let ft = b.func_type(vec![param], vec![result]);
    let f = b.func("f", ft, Some(body));

    let file = b.file("a.go", "main", vec![f]);
    let (_, checker, result) = check(&mut conf, &mut ws, &[file], None, None);
    assert!(result.is_ok(), "{:?}", messages(&errors));

    let implicits = checker.info().implicits.as_ref().unwrap();
    let int = ws.types.basic(BasicKind::Int);
    assert!(implicits
        .values()
        .any(|obj| ws.object(*obj).name == "v" && ws.obj_type(*obj) == int));
}

#[test]
fn top_level_statements_are_logged_in_order() {
    let mut ws = Workspace::new();
    let mut conf = Config::new();
    let mut b = AstBuilder::new();

    // x := 1; x++
    let one = b.int(1);
    let define = b.define(&["x"], vec![one]);
    let define = b.stmt_item(define);
    let x = b.ident("x");
    let inc = b.inc_dec(x, true);
    let inc = b.stmt_item(inc);

    let file = b.file("repl.go", "main", vec![define, inc]);
    let (pkg, checker, result) = check(&mut conf, &mut ws, &[file], None, None);
    assert!(result.is_ok());

    let x = ws.pkg_lookup(pkg, "x").unwrap();
    let log = checker.info().new_code.as_ref().unwrap();
    // Both statements in arrival order, then the variable the first declared.
    assert_eq!(log.len(), 3);
    assert!(log[0].obj.is_none() && !log[0].is_expr);
    assert!(log[1].obj.is_none());
    assert_eq!(log[2].obj, Some(x));
    assert!(log[2].is_pkg_scope);

    // x = "s" in the next batch is a mismatch against the declared int.
    let (mut conf, errors) = collecting_config();
    let x = b.ident("x");
    let s = b.string("s");
    let assign = b.assign(vec![x], AssignOp::Assign, vec![s]);
    let assign = b.stmt_item(assign);
    let file = b.file("repl.go", "main", vec![assign]);
    let (_, _, result) = check(&mut conf, &mut ws, &[file], Some(pkg), Some(checker));
    assert!(result.is_err());
    assert_eq!(kinds(&errors), vec![ErrorKind::TypeMismatch]);
}

#[test]
fn type_relations_hold_for_predeclared_types() {
    let mut ws = Workspace::new();
    let kinds = [
        BasicKind::Bool,
        BasicKind::Int,
        BasicKind::Int8,
        BasicKind::Uint64,
        BasicKind::Float64,
        BasicKind::String,
        BasicKind::UntypedInt,
        BasicKind::UntypedFloat,
        BasicKind::UntypedRune,
        BasicKind::UntypedString,
    ];
    let mut types: Vec<_> = kinds.iter().map(|k| ws.types.basic(*k)).collect();
    let int = ws.types.basic(BasicKind::Int);
    let byte = ws.types.byte();
    types.push(ws.types.slice(int));
    types.push(ws.types.slice(byte));
    types.push(ws.types.pointer(int));

    for &v in &types {
        assert!(ws.identical(v, v));
        for &t in &types {
            assert_eq!(ws.identical(v, t), ws.identical(t, v));
            if ws.assignable_to(v, t) {
                assert!(ws.convertible_to(v, t));
            }
        }
    }
}

#[test]
fn lookup_returns_the_declared_object() {
    let mut ws = Workspace::new();
    let mut conf = Config::new();
    let mut b = AstBuilder::new();

    let one = b.int(1);
    let c = b.const_(&["c"], None, vec![one]);
    let file = b.file("a.go", "main", vec![c]);
    let (pkg, checker, _) = check(&mut conf, &mut ws, &[file], None, None);

    let scope = ws.package(pkg).scope;
    let first = ws.lookup(scope, ustr::ustr("c"));
    assert!(first.is_some());
    assert_eq!(first, ws.lookup(scope, ustr::ustr("c")));
    assert_eq!(checker.decl_site("c").map(|d| d.obj), first);
}

#[derive(Default)]
struct ImportLog {
    imports: usize,
    imports_from: Vec<(String, String, ImportMode)>,
    pkg: Option<PackageId>,
}

/// Serves one package for every path and remembers how it was asked.
#[derive(Clone)]
struct RecordingImporter {
    log: Rc<RefCell<ImportLog>>,
    from_dir: bool,
}

impl RecordingImporter {
    fn new(from_dir: bool) -> Self {
        Self {
            log: Rc::new(RefCell::new(ImportLog::default())),
            from_dir,
        }
    }

    fn serve(&self, ws: &mut Workspace, path: &str) -> PackageId {
        let mut log = self.log.borrow_mut();
        *log.pkg.get_or_insert_with(|| {
            let pkg = ws.new_package(path, path);
            ws.package_mut(pkg).complete = true;
            pkg
        })
    }
}

impl Importer for RecordingImporter {
    fn import(&mut self, ws: &mut Workspace, path: &str, _: usize) -> Result<PackageId, ImportFailure> {
        self.log.borrow_mut().imports += 1;
        Ok(self.serve(ws, path))
    }

    fn as_importer_from(&mut self) -> Option<&mut dyn ImporterFrom> {
        if self.from_dir {
            Some(self)
        } else {
            None
        }
    }
}

impl ImporterFrom for RecordingImporter {
    fn import_from(
        &mut self,
        ws: &mut Workspace,
        path: &str,
        dir: &str,
        mode: ImportMode,
        _: usize,
    ) -> Result<PackageId, ImportFailure> {
        self.log
            .borrow_mut()
            .imports_from
            .push((path.to_string(), dir.to_string(), mode));
        Ok(self.serve(ws, path))
    }
}

fn two_files_importing_fmt(b: &mut AstBuilder) -> Vec<File> {
    let import = b.import("fmt");
    let first = b.file("app/a.go", "main", vec![import]);
    b.set_file(1);
    let import = b.import("fmt");
    let second = b.file("app/b.go", "main", vec![import]);
    vec![first, second]
}

#[test]
fn every_import_reaches_the_importer_without_caching() {
    let mut ws = Workspace::new();
    let importer = RecordingImporter::new(false);
    let mut conf = Config {
        importer: Some(Box::new(importer.clone())),
        disable_unused_import_check: true,
        ..Default::default()
    };
    let mut b = AstBuilder::new();
    let files = two_files_importing_fmt(&mut b);

    let (_, _, result) = check(&mut conf, &mut ws, &files, None, None);
    assert!(result.is_ok());
    assert_eq!(importer.log.borrow().imports, 2);
}

#[test]
fn cached_imports_reach_the_importer_once() {
    let mut ws = Workspace::new();
    let importer = RecordingImporter::new(false);
    let mut conf = Config {
        importer: Some(Box::new(importer.clone())),
        disable_unused_import_check: true,
        allow_import_caching: true,
        ..Default::default()
    };
    let mut b = AstBuilder::new();
    let files = two_files_importing_fmt(&mut b);

    let (_, _, result) = check(&mut conf, &mut ws, &files, None, None);
    assert!(result.is_ok());
    assert_eq!(importer.log.borrow().imports, 1);
}

#[test]
fn directory_aware_importers_receive_the_file_directory() {
    let mut ws = Workspace::new();
    let importer = RecordingImporter::new(true);
    let mut conf = Config {
        importer: Some(Box::new(importer.clone())),
        disable_unused_import_check: true,
        ..Default::default()
    };
    let mut b = AstBuilder::new();
    let import = b.import("fmt");
    let file = b.file("src/app/main.go", "main", vec![import]);

    let (_, _, result) = check(&mut conf, &mut ws, &[file], None, None);
    assert!(result.is_ok());

    let log = importer.log.borrow();
    assert_eq!(log.imports, 0);
    assert_eq!(
        log.imports_from,
        vec![("fmt".to_string(), "src/app".to_string(), ImportMode::default())]
    );
}

#[test]
fn every_member_of_an_initialization_cycle_is_left_out() {
    let mut ws = Workspace::new();
    let (mut conf, errors) = collecting_config();
    let mut b = AstBuilder::new();

    // var a = f(); var b = a
    let f = b.ident("f");
    let call = b.call(f, vec![]);
    let a = b.var(&["a"], None, vec![call]);
    let a_ref = b.ident("a");
    let b_decl = b.var(&["b"], None, vec![a_ref]);

    // func f() int { return b }
    let b_ref = b.ident("b");
    let ret = b.ret(vec![b_ref]);
    let body = b.block(vec![ret]);
    let int = b.ident("int");
    let result = b.field(&[], int);
    let ft = b.func_type(vec![], vec![result]);
    let f = b.func("f", ft, Some(body));

    let file = b.file("a.go", "main", vec![a, b_decl, f]);
    let (_, checker, result) = check(&mut conf, &mut ws, &[file], None, None);

    assert_eq!(result.map_err(|e| e.kind), Err(ErrorKind::CyclicDeclaration));
    let headers: Vec<String> = messages(&errors)
        .into_iter()
        .filter(|m| m.starts_with("initialization cycle"))
        .collect();
    assert_eq!(headers, vec!["initialization cycle for a"]);
    assert!(checker.info().init_order().is_empty());
}

#[test]
fn large_constants_stay_exact() {
    let mut ws = Workspace::new();
    let (mut conf, errors) = collecting_config();
    let mut b = AstBuilder::new();

    // const big = 1 << 200; const x = big >> 190
    let one = b.int(1);
    let n = b.int(200);
    let shl = b.binary(BinaryOp::Shl, one, n);
    let big = b.const_(&["big"], None, vec![shl]);
    let big_ref = b.ident("big");
    let n = b.int(190);
    let shr = b.binary(BinaryOp::Shr, big_ref, n);
    let x = b.const_(&["x"], None, vec![shr]);

    // const k = 0.1 + 0.2 == 0.3
    let a = b.float("0.1");
    let c = b.float("0.2");
    let sum = b.binary(BinaryOp::Add, a, c);
    let d = b.float("0.3");
    let eq = b.binary(BinaryOp::Eq, sum, d);
    let k = b.const_(&["k"], None, vec![eq]);

    let file = b.file("a.go", "main", vec![big, x, k]);
    let (pkg, _, result) = check(&mut conf, &mut ws, &[file], None, None);
    assert!(result.is_ok(), "{:?}", messages(&errors));

    let value = |ws: &Workspace, name: &str| {
        let obj = ws.pkg_lookup(pkg, name).unwrap();
        ws.object(obj).kind.as_const().cloned().unwrap()
    };
    assert_eq!(value(&ws, "x"), ConstValue::int(1024));
    assert_eq!(value(&ws, "k"), ConstValue::Bool(true));
}

#[test]
fn ignored_bodies_still_resolve_signatures() {
    let mut ws = Workspace::new();
    let (mut conf, errors) = collecting_config();
    conf.ignore_func_bodies = true;
    let mut b = AstBuilder::new();

    // func f(x int) string { return y }
    let y = b.ident("y");
    let ret = b.ret(vec![y]);
    let body = b.block(vec![ret]);
    let int = b.ident("int");
    let param = b.field(&["x"], int);
    let string = b.ident("string");
    let result = b.field(&[], string);
    let ft = b.func_type(vec![param], vec![result]);
    let f = b.func("f", ft, Some(body));

    let file = b.file("a.go", "main", vec![f]);
    let (pkg, _, result) = check(&mut conf, &mut ws, &[file], None, None);
    assert!(result.is_ok());
    assert!(errors.borrow().is_empty());

    let f = ws.pkg_lookup(pkg, "f").unwrap();
    let sig = match ws.types.get(ws.obj_type(f)) {
        Type::Signature(sig) => sig.clone(),
        other => panic!("f has type {:?}", other),
    };
    let params = ws.tuple_vars(sig.params).to_vec();
    assert_eq!(params.len(), 1);
    assert_eq!(ws.obj_type(params[0]), ws.types.basic(BasicKind::Int));
    let results = ws.tuple_vars(sig.results).to_vec();
    assert_eq!(ws.obj_type(results[0]), ws.types.basic(BasicKind::String));
}

fn shadowed_naked_return(b: &mut AstBuilder) -> File {
    // func f() (r int) { { r := 2; return }; return }
    let two = b.int(2);
    let define = b.define(&["r"], vec![two]);
    let inner_ret = b.ret(vec![]);
    let inner = b.block_stmt(vec![define, inner_ret]);
    let outer_ret = b.ret(vec![]);
    let body = b.block(vec![inner, outer_ret]);
    let int = b.ident("int");
    let result = b.field(&["r"], int);
    let ft = b.func_type(vec![], vec![result]);
    let f = b.func("f", ft, Some(body));
    b.file("a.go", "main", vec![f])
}

#[test]
fn naked_return_under_a_shadowed_result_is_an_error_unless_allowed() {
    let mut ws = Workspace::new();
    let (mut conf, errors) = collecting_config();
    conf.allow_unused_var = true;
    let mut b = AstBuilder::new();
    let file = shadowed_naked_return(&mut b);

    let (_, _, result) = check(&mut conf, &mut ws, &[file], None, None);
    assert!(result.is_err());
    assert_eq!(
        messages(&errors),
        vec![
            "result parameter r not in scope at return".to_string(),
            "\tinner declaration of r".to_string(),
        ]
    );

    let mut ws = Workspace::new();
    let (mut conf, errors) = collecting_config();
    conf.allow_unused_var = true;
    conf.allow_over_shadowed_naked_returns = true;
    let mut b = AstBuilder::new();
    let file = shadowed_naked_return(&mut b);

    let (_, _, result) = check(&mut conf, &mut ws, &[file], None, None);
    assert!(result.is_ok(), "{:?}", messages(&errors));
    assert!(errors.borrow().is_empty());
}

#[test]
fn untyped_operands_are_recorded_with_their_final_type() {
    let mut ws = Workspace::new();
    let mut conf = Config::new();
    let mut b = AstBuilder::new();

    // var x float64 = 1 + 2
    let one = b.int(1);
    let two = b.int(2);
    let (one_id, two_id) = (one.id, two.id);
    let sum = b.binary(BinaryOp::Add, one, two);
    let sum_id = sum.id;
    let float64 = b.ident("float64");
    let x = b.var(&["x"], Some(float64), vec![sum]);
    let file = b.file("a.go", "main", vec![x]);

    let (_, checker, result) = check(&mut conf, &mut ws, &[file], None, None);
    assert!(result.is_ok());

    let float64 = ws.types.basic(BasicKind::Float64);
    let info = checker.info();
    for node in [one_id, two_id, sum_id] {
        let tv = info.type_and_value(node).unwrap();
        assert_eq!(tv.ty, float64);
        assert_eq!(tv.mode, OperandMode::Constant);
    }
    let value = info.type_and_value(sum_id).unwrap().value.as_ref();
    assert_eq!(value.and_then(|v| v.float_val()), Some(3.0));
}
