//! Seller onboarding: a user applies once, an admin approves or rejects.

use crate::error::ServiceError;
use crate::models::{new_id, SellerApplication, SellerApplyRequest, SellerDecision, SellerStatus};

/// A user may apply again only after every earlier application was rejected.
pub fn ensure_can_apply(existing: &[SellerApplication]) -> Result<(), ServiceError> {
    if existing.iter().any(|a| a.status == SellerStatus::Approved) {
        return Err(ServiceError::Policy("You are already an approved seller".to_string()));
    }
    if existing.iter().any(|a| a.status == SellerStatus::Pending) {
        return Err(ServiceError::Policy("Application already under review".to_string()));
    }
    Ok(())
}

pub fn new_application(user_id: &str, req: &SellerApplyRequest, now: i64) -> SellerApplication {
    SellerApplication {
        id: new_id(),
        user_id: user_id.to_string(),
        shop_name: req.shop_name.trim().to_string(),
        owner_name: req.owner_name.trim().to_string(),
        email: req.email.trim().to_lowercase(),
        phone: req.phone.trim().to_string(),
        city: req.city.trim().to_string(),
        description: req.description.trim().to_string(),
        status: SellerStatus::Pending,
        admin_note: None,
        date: now,
        reviewed_at: None,
    }
}

pub fn decide(
    application: &mut SellerApplication,
    decision: SellerDecision,
    note: Option<&str>,
    now: i64,
) -> Result<(), ServiceError> {
    if application.status != SellerStatus::Pending {
        return Err(ServiceError::Policy(format!(
            "Application already {}",
            application.status
        )));
    }

    application.status = match decision {
        SellerDecision::Approve => SellerStatus::Approved,
        SellerDecision::Reject => SellerStatus::Rejected,
    };
    application.admin_note = note.map(str::trim).filter(|n| !n.is_empty()).map(str::to_string);
    application.reviewed_at = Some(now);
    Ok(())
}
