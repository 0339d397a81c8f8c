//! cadrive: client document drive for accounting practices
//!
//! Each tenant (a practice) owns a set of clients and one storage bucket.
//! Every client gets a generated folder tree per fiscal year.
//!
//! # Features
//! - Fiscal-year aware folder taxonomy (ITR, GST, TDS, KYC)
//! - Document uploads into the tree, stored per tenant bucket
//! - Recycle bin with restore and a scheduled retention purge
//! - Client provisioning, cascade removal and yearly rollover
//! - MongoDB catalog and S3-compatible storage, with in-memory variants

pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod fiscal_year;
pub mod jobs;
pub mod models;
pub mod registry;
pub mod routes;
pub mod services;
pub mod storage;

pub use config::DriveConfig;
pub use db::MongoDb;
pub use error::{DriveError, DriveResult};

use mongodb::bson::oid::ObjectId;

/// Role of the caller as asserted by the upstream identity layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrincipalRole {
    /// Staff of the tenant practice
    Staff,
    /// A client of the practice, limited to its own drive
    Client,
}

/// Authenticated principal from auth middleware
#[derive(Clone, Debug)]
pub struct AuthenticatedPrincipal {
    pub tenant_id: ObjectId,
    pub role: PrincipalRole,
    /// Set for client principals
    pub client_id: Option<ObjectId>,
    /// Display identity recorded on deletions and activity
    pub actor: String,
}

impl AuthenticatedPrincipal {
    pub fn staff(tenant_id: ObjectId, actor: impl Into<String>) -> Self {
        Self {
            tenant_id,
            role: PrincipalRole::Staff,
            client_id: None,
            actor: actor.into(),
        }
    }

    pub fn client(tenant_id: ObjectId, client_id: ObjectId) -> Self {
        Self {
            tenant_id,
            role: PrincipalRole::Client,
            client_id: Some(client_id),
            actor: format!("client:{}", client_id.to_hex()),
        }
    }

    pub fn is_staff(&self) -> bool {
        self.role == PrincipalRole::Staff
    }
}
