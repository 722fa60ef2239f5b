//! Package Catalog.
//!
//! Packages are read-only from the booking core's point of view. Renewal reads the latest
//! revision through [`PackageCatalog::get_package`]; expiry and remaining-classes read the
//! revision a member bought through [`PackageCatalog::get_package_revision`]. The administrative
//! operations here are for whoever maintains the catalog. Every edit appends a new revision and
//! never rewrites an old one.

use crate::environment::PackageCatalog;
use crate::error::{BookingError, EntityKind, Result, StoreError};
use crate::types::{Allowance, Money, Package, PackageId};
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Input for a new package.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewPackage {
    /// Display name
    pub name: String,
    /// Price
    pub price: Money,
    /// Validity window in days
    pub duration_days: u32,
    /// Number of classes granted
    pub class_allowance: Allowance,
}

/// Administrative edit of a package. `None` leaves a field unchanged.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PackageUpdate {
    /// New name
    pub name: Option<String>,
    /// New price
    pub price: Option<Money>,
    /// New validity window
    pub duration_days: Option<u32>,
    /// New allowance
    pub class_allowance: Option<Allowance>,
}

fn validate(name: &str, duration_days: u32) -> Result<()> {
    if name.trim().is_empty() {
        return Err(BookingError::Validation(
            "package name must not be empty".to_string(),
        ));
    }
    if duration_days == 0 {
        return Err(BookingError::Validation(
            "package duration must be at least one day".to_string(),
        ));
    }
    Ok(())
}

/// Package catalog held in memory, with every revision of every package.
#[derive(Clone, Debug, Default)]
pub struct InMemoryPackageCatalog {
    packages: Arc<RwLock<HashMap<PackageId, Vec<Package>>>>,
}

type Revisions = HashMap<PackageId, Vec<Package>>;

fn poisoned() -> StoreError {
    StoreError::Database("package catalog lock poisoned".to_string())
}

impl InMemoryPackageCatalog {
    /// Create an empty catalog
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an active package at revision 1.
    ///
    /// # Errors
    ///
    /// - `Validation`: empty name or zero duration
    pub fn create_package(&self, new: NewPackage) -> Result<Package> {
        validate(&new.name, new.duration_days)?;
        let package = Package {
            id: PackageId::new(),
            name: new.name,
            price: new.price,
            duration_days: new.duration_days,
            class_allowance: new.class_allowance,
            active: true,
            revision: 1,
        };
        self.write()?.insert(package.id, vec![package.clone()]);
        tracing::debug!(package_id = %package.id, name = %package.name, "Package created");
        Ok(package)
    }

    /// Publish a new revision of a package.
    ///
    /// Members already holding an earlier revision keep its duration and allowance; the edit
    /// applies from their next renewal onwards.
    ///
    /// # Errors
    ///
    /// - `NotFound`: no such package
    /// - `Validation`: empty name or zero duration
    pub fn update_package(&self, package_id: PackageId, update: PackageUpdate) -> Result<Package> {
        self.revise(package_id, |next| {
            if let Some(name) = update.name {
                next.name = name;
            }
            if let Some(price) = update.price {
                next.price = price;
            }
            if let Some(days) = update.duration_days {
                next.duration_days = days;
            }
            if let Some(allowance) = update.class_allowance {
                next.class_allowance = allowance;
            }
            validate(&next.name, next.duration_days)
        })
    }

    /// Make a package sellable or withdraw it. Withdrawn packages stay resolvable for members
    /// who already hold them.
    ///
    /// # Errors
    ///
    /// - `NotFound`: no such package
    pub fn set_active(&self, package_id: PackageId, active: bool) -> Result<Package> {
        let current = self.get(package_id)?;
        if current.active == active {
            return Ok(current);
        }
        self.revise(package_id, |next| {
            next.active = active;
            Ok(())
        })
    }

    /// Packages currently on sale, cheapest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog lock is poisoned.
    pub fn list_active(&self) -> Result<Vec<Package>> {
        let packages = self.packages.read().map_err(|_| poisoned())?;
        let mut active: Vec<Package> = packages
            .values()
            .filter_map(|revisions| revisions.last())
            .filter(|p| p.active)
            .cloned()
            .collect();
        active.sort_by(|a, b| (a.price, &a.name).cmp(&(b.price, &b.name)));
        Ok(active)
    }

    /// Look up the latest revision of a package, active or not.
    ///
    /// # Errors
    ///
    /// - `NotFound`: no such package
    pub fn get(&self, package_id: PackageId) -> Result<Package> {
        self.packages
            .read()
            .map_err(|_| poisoned())?
            .get(&package_id)
            .and_then(|revisions| revisions.last())
            .cloned()
            .ok_or_else(|| BookingError::not_found(EntityKind::Package, package_id))
    }

    fn revise(
        &self,
        package_id: PackageId,
        edit: impl FnOnce(&mut Package) -> Result<()>,
    ) -> Result<Package> {
        let mut packages = self.write()?;
        let revisions = packages
            .get_mut(&package_id)
            .ok_or_else(|| BookingError::not_found(EntityKind::Package, package_id))?;
        let Some(current) = revisions.last() else {
            return Err(BookingError::not_found(EntityKind::Package, package_id));
        };

        let mut next = current.clone();
        edit(&mut next)?;
        next.revision = current.revision.saturating_add(1);
        revisions.push(next.clone());
        tracing::debug!(%package_id, revision = next.revision, "Package revised");
        Ok(next)
    }

    fn write(&self) -> std::result::Result<std::sync::RwLockWriteGuard<'_, Revisions>, StoreError> {
        self.packages.write().map_err(|_| poisoned())
    }
}

impl PackageCatalog for InMemoryPackageCatalog {
    fn get_package(
        &self,
        package_id: PackageId,
    ) -> BoxFuture<'_, std::result::Result<Option<Package>, StoreError>> {
        Box::pin(async move {
            let packages = self.packages.read().map_err(|_| poisoned())?;
            Ok(packages
                .get(&package_id)
                .and_then(|revisions| revisions.last())
                .cloned())
        })
    }

    fn get_package_revision(
        &self,
        package_id: PackageId,
        revision: u32,
    ) -> BoxFuture<'_, std::result::Result<Option<Package>, StoreError>> {
        Box::pin(async move {
            let packages = self.packages.read().map_err(|_| poisoned())?;
            Ok(packages
                .get(&package_id)
                .and_then(|revisions| revisions.iter().find(|p| p.revision == revision))
                .cloned())
        })
    }
}
