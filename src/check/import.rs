use super::{CheckSess, DotImport};
use crate::{
    ast::{File, ImportSpec},
    common::path::dir_name,
    config::{ImportFailure, ImportMode},
    error::ErrorKind,
    span::Span,
    workspace::{
        object::{ObjectFlags, ObjectKind},
        package::PackageId,
        scope::{RedeclareMode, ScopeId},
        NewObject, Redeclared,
    },
};
use ustr::{ustr, Ustr};

impl<'s> CheckSess<'s> {
    /// Resolves an import spec and binds the imported package's name in the
    /// file scope.
    pub fn collect_import(&mut self, file: &File, file_scope: ScopeId, spec: &ImportSpec) {
        let path = spec.path;
        if path.is_empty() {
            self.error(ErrorKind::Import, spec.span, "invalid import path (empty string)");
            return;
        }

        let dir = ustr(dir_name(&file.path));
        let imported = match self.import_package(spec.span, path, dir) {
            Some(pkg) => pkg,
            None => return,
        };

        self.ws.package_mut(self.pkg).add_import(imported);

        let name = match &spec.name {
            Some(ident) => ident.name,
            None => self.ws.package(imported).name,
        };

        if name == "init" {
            self.invalid_op(spec.span, "cannot declare init - must be func");
            return;
        }

        let span = spec.name.as_ref().map_or(spec.span, |ident| ident.span);
        let invalid = self.ws.types.invalid();
        let obj = self.ws.new_object(
            NewObject::new(ObjectKind::PkgName(imported), name, span, Some(self.pkg)).with_type(invalid),
        );

        match &spec.name {
            Some(ident) => self.record_def(ident.id, Some(obj)),
            None => {
                self.ws.object_mut(obj).flags.insert(ObjectFlags::IMPLICIT);
                self.record_implicit(spec.id, obj);
            }
        }

        if name == "." {
            self.dot_import(file_scope, imported, path, spec.span);
        } else if name != "_" {
            match self.ws.declare(file_scope, obj, RedeclareMode::Forbid) {
                Ok(_) => self.batch_imports.push(obj),
                Err(Redeclared { prev }) => self.report_redeclared(name, span, prev),
            }
        }

        self.log_new_code(Some(obj), file_scope, spec.id, false, false, None);
    }

    /// Merges the exported objects of `imported` into the file scope.
    fn dot_import(&mut self, file_scope: ScopeId, imported: PackageId, path: Ustr, span: Span) {
        let scope = self.ws.package(imported).scope;
        let exported: Vec<_> = self
            .ws
            .scope(scope)
            .elems
            .values()
            .copied()
            .filter(|obj| self.ws.object(*obj).is_exported())
            .collect();

        for obj in exported {
            // The object keeps its own parent scope.
            let name = self.ws.object(obj).name;
            if let Some(prev) = self.ws.scope_mut(file_scope).insert(name, obj) {
                if prev != obj {
                    self.report_redeclared(name, span, prev);
                }
            }
        }

        self.dot_imports.push(DotImport {
            file_scope,
            pkg: imported,
            path,
            span,
            used: false,
        });
    }

    /// Finds the package for `path` as seen from directory `dir`. A failed
    /// import is reported and replaced by whatever the importer could
    /// provide, or by an empty stand-in, so that its uses stay quiet.
    /// Without caching every occurrence goes back to the importer.
    fn import_package(&mut self, span: Span, path: Ustr, dir: Ustr) -> Option<PackageId> {
        let key = (path, dir);

        if self.conf.allow_import_caching {
            if let Some(pkg) = self.chk.imports.get(&key) {
                return Some(*pkg);
            }
        }

        let _span = tracing::debug_span!("import", %path, %dir, depth = self.depth).entered();

        let result = if path == "C" && self.conf.fake_import_c {
            Ok(self.fake_package(path))
        } else if path == "unsafe" {
            Ok(self.ws.universe.unsafe_pkg)
        } else {
            self.call_importer(path, dir)
        };

        let pkg = match result {
            Ok(pkg) => pkg,
            Err(failure) => {
                tracing::warn!(%path, error = %failure, "import failed");
                self.error(
                    ErrorKind::Import,
                    span,
                    format!("could not import {} ({})", path, failure.message),
                );

                match failure.partial {
                    Some(pkg) => pkg,
                    // Without a stand-in `C.x` is reported as undeclared.
                    None if path == "C" => return None,
                    None => self.fake_package(path),
                }
            }
        };

        if self.conf.allow_import_caching {
            self.chk.imports.insert(key, pkg);
        }

        Some(pkg)
    }

    fn call_importer(&mut self, path: Ustr, dir: Ustr) -> Result<PackageId, ImportFailure> {
        let depth = self.depth;
        let ws = &mut *self.ws;

        match self.conf.importer.as_mut() {
            Some(importer) => match importer.as_importer_from() {
                Some(from) => from.import_from(ws, &path, &dir, ImportMode::default(), depth),
                None => importer.import(ws, &path, depth),
            },
            None => Err(ImportFailure::new("no importer configured")),
        }
    }

    fn fake_package(&mut self, path: Ustr) -> PackageId {
        let pkg = self.ws.new_package(&path, crate::common::path::package_name_for_path(&path));
        let package = self.ws.package_mut(pkg);
        package.fake = true;
        package.complete = true;
        self.fake_pkgs.insert(pkg);
        pkg
    }
}
