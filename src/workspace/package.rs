use super::scope::ScopeId;
use crate::define_id_type;
use ustr::Ustr;

define_id_type!(PackageId);

#[derive(Debug, PartialEq, Clone)]
pub struct Package {
    pub id: PackageId,
    pub path: Ustr,
    pub name: Ustr,
    pub scope: ScopeId,
    /// Set once a check of the package finished without hard errors.
    pub complete: bool,
    /// Directly imported packages, in import order.
    pub imports: Vec<PackageId>,
    /// A stand-in created for `import "C"` or for an import that failed.
    pub fake: bool,
}

impl Package {
    pub fn add_import(&mut self, pkg: PackageId) {
        if !self.imports.contains(&pkg) {
            self.imports.push(pkg);
        }
    }
}
