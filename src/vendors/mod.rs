use chrono::{DateTime, Utc};
use postgres_from_row::FromRow;
use uuid::Uuid;

use crate::approval::ApprovalStatus;

pub mod handlers;

/// A seller profile. One per user.
#[derive(serde::Serialize, Debug, Clone, PartialEq, FromRow)]
pub struct Vendor {
	pub id: Uuid,
	pub user_id: Uuid,
	pub business_name: String,
	pub phone: String,
	pub address: String,
	pub pan_number: Option<String>,
	pub description: Option<String>,
	pub approval_status: ApprovalStatus,
	pub rejection_reason: Option<String>,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

impl Vendor {
	pub fn is_approved(&self) -> bool {
		self.approval_status == ApprovalStatus::Approved
	}
}
