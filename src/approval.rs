//! Admin approval workflow shared by vendors and vehicles.
use crate::error::{AppError, AppResult};

text_enum! {
	/// Admin-controlled state gating whether a vendor or vehicle is visible.
	pub enum ApprovalStatus {
		Pending => "pending",
		Approved => "approved",
		Rejected => "rejected",
	}
}

#[derive(serde::Deserialize, Debug)]
pub struct ApprovalDecision {
	pub status: ApprovalStatus,
	pub reason: Option<String>,
}

impl ApprovalDecision {
	/// Only `approved` and `rejected` are decisions; rejections must say why.
	pub fn validate(self) -> AppResult<(ApprovalStatus, Option<String>)> {
		let reason = self.reason.map(|r| r.trim().to_string()).filter(|r| !r.is_empty());
		match self.status {
			ApprovalStatus::Pending => Err(AppError::BadRequest("decision must be approved or rejected".to_string())),
			ApprovalStatus::Approved => Ok((ApprovalStatus::Approved, None)),
			ApprovalStatus::Rejected => match reason {
				Some(reason) => Ok((ApprovalStatus::Rejected, Some(reason))),
				None => Err(AppError::BadRequest("a rejection needs a reason".to_string())),
			},
		}
	}
}
