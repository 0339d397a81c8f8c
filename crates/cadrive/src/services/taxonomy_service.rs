//! Folder taxonomy generation.
//!
//! The tree for one client is described by [`taxonomy_plan`] and then
//! materialised node by node. A parent is always persisted before any of its
//! children is attempted.

use std::sync::Arc;

use chrono::NaiveDate;
use mongodb::bson::oid::ObjectId;
use serde::Serialize;

use crate::catalog::Catalog;
use crate::error::{DriveError, DriveResult};
use crate::fiscal_year::{fiscal_year_window, FiscalYear};
use crate::models::{Category, ClientProfile, Folder, Recyclable};

pub const KYC_FOLDER: &str = "KYC";
pub const INCOME_TAX_FOLDER: &str = "Income Tax";
pub const BANK_STATEMENT_FOLDER: &str = "Bank statement";
pub const GST_FOLDER: &str = "GST";
pub const TDS_FOLDER: &str = "TDS";
pub const SALE_BILL_FOLDER: &str = "Sale Bill";
pub const PURCHASE_BILL_FOLDER: &str = "Purchase Bill";

/// GST months in fiscal-year order
pub const MONTHS: [&str; 12] = [
    "1-APRIL",
    "2-MAY",
    "3-JUNE",
    "4-JULY",
    "5-AUGUST",
    "6-SEPTEMBER",
    "7-OCTOBER",
    "8-NOVEMBER",
    "9-DECEMBER",
    "10-JANUARY",
    "11-FEBRUARY",
    "12-MARCH",
];

pub const QUARTERS: [&str; 4] = ["Q1 - APR-JUN", "Q2 - JUL-SEP", "Q3 - OCT-DEC", "Q4 - JAN-MAR"];

/// Actor recorded on generated folders
pub const SYSTEM_ACTOR: &str = "system";

/// One planned folder and its planned children
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderPlan {
    pub name: String,
    pub category: Category,
    pub children: Vec<FolderPlan>,
}

impl FolderPlan {
    fn leaf(name: &str, category: Category) -> Self {
        Self {
            name: name.to_string(),
            category,
            children: Vec::new(),
        }
    }

    fn branch(name: &str, category: Category, children: Vec<FolderPlan>) -> Self {
        Self {
            name: name.to_string(),
            category,
            children,
        }
    }

    /// Number of folders in this subtree, itself included
    pub fn size(&self) -> usize {
        1 + self.children.iter().map(FolderPlan::size).sum::<usize>()
    }
}

fn fiscal_year_plan(client: &ClientProfile, year: FiscalYear) -> FolderPlan {
    let mut sections = vec![FolderPlan::branch(
        INCOME_TAX_FOLDER,
        Category::Itr,
        vec![FolderPlan::leaf(BANK_STATEMENT_FOLDER, Category::Itr)],
    )];

    if client.is_business() {
        let months = MONTHS
            .iter()
            .map(|month| {
                FolderPlan::branch(
                    month,
                    Category::Gst,
                    vec![
                        FolderPlan::leaf(SALE_BILL_FOLDER, Category::Gst),
                        FolderPlan::leaf(PURCHASE_BILL_FOLDER, Category::Gst),
                    ],
                )
            })
            .collect();
        sections.push(FolderPlan::branch(GST_FOLDER, Category::Gst, months));
    }

    if client.has_tax_deduction_id() {
        let quarters = QUARTERS
            .iter()
            .map(|quarter| FolderPlan::leaf(quarter, Category::Tds))
            .collect();
        sections.push(FolderPlan::branch(TDS_FOLDER, Category::Tds, quarters));
    }

    FolderPlan::branch(&year.label(), Category::General, sections)
}

/// Root folders for a client: one per fiscal year in the window (oldest
/// first) followed by the client-wide KYC folder
pub fn taxonomy_plan(client: &ClientProfile, window: &[FiscalYear]) -> Vec<FolderPlan> {
    let mut roots: Vec<FolderPlan> = window
        .iter()
        .map(|year| fiscal_year_plan(client, *year))
        .collect();
    roots.push(FolderPlan::leaf(KYC_FOLDER, Category::Kyc));
    roots
}

/// Outcome of one generation run for one client
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationReport {
    pub client_id: String,
    /// Folders inserted by this run
    pub created: usize,
    /// Folders that already existed and were reused
    pub existing: usize,
    /// Planned folders found in the recycle bin; they and their subtrees
    /// are left alone
    pub binned: usize,
    /// True when initial generation found the client already provisioned
    pub skipped: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// Every node is inserted; any failure stops the run
    Initial,
    /// Nodes are looked up by (client, parent, name) in any recycle state and
    /// only missing ones inserted
    Incremental,
}

pub struct TaxonomyService {
    catalog: Arc<dyn Catalog>,
}

impl TaxonomyService {
    pub fn new(catalog: Arc<dyn Catalog>) -> Self {
        Self { catalog }
    }

    /// Initial generation. A client that already has any root folder is
    /// left untouched.
    pub async fn generate(&self, client: &ClientProfile, today: NaiveDate) -> DriveResult<GenerationReport> {
        if self.catalog.count_root_folders(&client.id).await? > 0 {
            tracing::debug!("Client {} already has folders, skipping generation", client.id);
            return Ok(GenerationReport {
                client_id: client.id.to_hex(),
                skipped: true,
                ..Default::default()
            });
        }

        let plan = taxonomy_plan(client, &fiscal_year_window(&today));
        self.build(client.id, &plan, Mode::Initial).await
    }

    /// Incremental generation: creates whatever part of the tree is missing,
    /// including the root of a newly entered fiscal year. Safe to re-run.
    pub async fn refresh(&self, client: &ClientProfile, today: NaiveDate) -> DriveResult<GenerationReport> {
        let plan = taxonomy_plan(client, &fiscal_year_window(&today));
        self.build(client.id, &plan, Mode::Incremental).await
    }

    async fn build(&self, client_id: ObjectId, plan: &[FolderPlan], mode: Mode) -> DriveResult<GenerationReport> {
        let mut report = GenerationReport {
            client_id: client_id.to_hex(),
            ..Default::default()
        };

        // Depth-first with an explicit stack; children are pushed in reverse
        // so siblings are created in plan order.
        let mut stack: Vec<(Option<Folder>, &FolderPlan)> =
            plan.iter().rev().map(|node| (None, node)).collect();

        while let Some((parent, node)) = stack.pop() {
            let folder = match self.materialise(client_id, parent.as_ref(), node, mode, &mut report).await {
                Ok(Some(folder)) => folder,
                Ok(None) => continue,
                Err(err) => {
                    tracing::warn!(
                        "Folder generation for client {} failed at '{}' after {} folders: {}",
                        client_id,
                        node.name,
                        report.created,
                        err
                    );
                    if report.created == 0 && report.existing == 0 {
                        return Err(err);
                    }
                    return Err(DriveError::PartialGeneration {
                        client_id: client_id.to_hex(),
                        created: report.created,
                        reason: err.to_string(),
                    });
                }
            };

            for child in node.children.iter().rev() {
                stack.push((Some(folder.clone()), child));
            }
        }

        if report.created > 0 {
            tracing::info!("Generated {} folders for client {}", report.created, client_id);
        }
        Ok(report)
    }

    async fn materialise(
        &self,
        client_id: ObjectId,
        parent: Option<&Folder>,
        node: &FolderPlan,
        mode: Mode,
        report: &mut GenerationReport,
    ) -> DriveResult<Option<Folder>> {
        let parent_id = parent.map(|p| p.id);

        if mode == Mode::Incremental {
            if let Some(existing) = self
                .catalog
                .find_folder_any_state(&client_id, parent_id.as_ref(), &node.name)
                .await?
            {
                if !existing.is_active() {
                    tracing::debug!(
                        "Folder '{}' of client {} is in the recycle bin, not regenerating",
                        node.name,
                        client_id
                    );
                    report.binned += 1;
                    return Ok(None);
                }
                report.existing += 1;
                return Ok(Some(existing));
            }
        }

        let folder = match parent {
            Some(parent) => parent.new_child(&node.name, node.category, SYSTEM_ACTOR),
            None => Folder::new_root(client_id, &node.name, node.category, SYSTEM_ACTOR),
        };

        match self.catalog.insert_folder(&folder).await {
            Ok(()) => {
                report.created += 1;
                Ok(Some(folder))
            }
            // Lost a race with a concurrent run; adopt the winner's folder
            Err(DriveError::Conflict(_)) if mode == Mode::Incremental => {
                let existing = self
                    .catalog
                    .find_active_folder(&client_id, parent_id.as_ref(), &node.name)
                    .await?
                    .ok_or_else(|| {
                        DriveError::Conflict(format!("folder '{}' is being created concurrently", node.name))
                    })?;
                report.existing += 1;
                Ok(Some(existing))
            }
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EntityType;

    fn client(entity_type: EntityType, tan: Option<&str>) -> ClientProfile {
        ClientProfile {
            id: ObjectId::new(),
            tenant_id: ObjectId::new(),
            name: "Test".into(),
            entity_type,
            tan_number: tan.map(str::to_string),
        }
    }

    fn window() -> Vec<FiscalYear> {
        vec![
            FiscalYear::starting(2022),
            FiscalYear::starting(2023),
            FiscalYear::starting(2024),
        ]
    }

    #[test]
    fn test_individual_plan() {
        let plan = taxonomy_plan(&client(EntityType::Individual, None), &window());
        let names: Vec<&str> = plan.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["FY - 2022-23", "FY - 2023-24", "FY - 2024-25", "KYC"]);

        let year = &plan[0];
        assert_eq!(year.category, Category::General);
        assert_eq!(year.children.len(), 1);
        assert_eq!(year.children[0].name, INCOME_TAX_FOLDER);
        assert_eq!(year.children[0].children[0].name, BANK_STATEMENT_FOLDER);

        // 3 years x (root + Income Tax + Bank statement) + KYC
        assert_eq!(plan.iter().map(FolderPlan::size).sum::<usize>(), 10);
    }

    #[test]
    fn test_business_with_tan_plan() {
        let plan = taxonomy_plan(&client(EntityType::Business, Some("BLRA12345B")), &window());
        let year = &plan[2];
        let sections: Vec<&str> = year.children.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(sections, vec![INCOME_TAX_FOLDER, GST_FOLDER, TDS_FOLDER]);

        let gst = &year.children[1];
        assert_eq!(gst.children.len(), 12);
        assert_eq!(gst.children[0].name, "1-APRIL");
        assert_eq!(gst.children[11].name, "12-MARCH");
        for month in &gst.children {
            let bills: Vec<&str> = month.children.iter().map(|p| p.name.as_str()).collect();
            assert_eq!(bills, vec![SALE_BILL_FOLDER, PURCHASE_BILL_FOLDER]);
            assert!(month.children.iter().all(|b| b.category == Category::Gst));
        }

        let tds = &year.children[2];
        assert_eq!(tds.children.len(), 4);
        assert!(tds.children.iter().all(|q| q.category == Category::Tds));
    }

    #[test]
    fn test_individual_with_tan_gets_tds_only() {
        let plan = taxonomy_plan(&client(EntityType::Individual, Some("TAN1")), &window());
        let sections: Vec<&str> = plan[0].children.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(sections, vec![INCOME_TAX_FOLDER, TDS_FOLDER]);
    }
}
