use super::CheckSess;
use crate::{
    error::ErrorKind,
    workspace::object::{ObjectFlags, ObjectKind},
};

impl<'s> CheckSess<'s> {
    /// Reports the imports of this batch that nothing referred to.
    pub fn unused_imports(&mut self) {
        if self.conf.disable_unused_import_check {
            return;
        }

        let mut unused = vec![];

        for obj in &self.batch_imports {
            let object = self.ws.object(*obj);
            if object.flags.contains(ObjectFlags::USED) {
                continue;
            }
            if let ObjectKind::PkgName(pkg) = object.kind {
                let pkg = self.ws.package(pkg);
                let msg = if object.name != pkg.name {
                    format!("{:?} imported but not used as {}", pkg.path.as_str(), object.name)
                } else {
                    format!("{:?} imported but not used", pkg.path.as_str())
                };
                unused.push((object.span, msg));
            }
        }

        for dot in self.dot_imports.iter().filter(|d| !d.used) {
            unused.push((dot.span, format!("{:?} imported but not used", dot.path.as_str())));
        }

        unused.sort_by_key(|(span, _)| *span);
        for (span, msg) in unused {
            self.error(ErrorKind::UnusedImport, span, msg);
        }
    }
}
