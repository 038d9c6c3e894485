//! Read-only views over a request collection.

use crate::db::models::clearance::{
    ApproverRole, ClearanceRequest, ClearanceStatus, Decision, StatusSummary,
};

/// Requests currently waiting on `role`.
pub fn pending_for(requests: &[ClearanceRequest], role: ApproverRole) -> Vec<ClearanceRequest> {
    requests
        .iter()
        .filter(|r| r.status() == ClearanceStatus::Pending && r.current_approver() == Some(role))
        .cloned()
        .collect()
}

pub fn approved_by(requests: &[ClearanceRequest], role: ApproverRole) -> Vec<ClearanceRequest> {
    decided_by(requests, role, Decision::Approved)
}

pub fn rejected_by(requests: &[ClearanceRequest], role: ApproverRole) -> Vec<ClearanceRequest> {
    decided_by(requests, role, Decision::Rejected)
}

pub fn info_requested_by(
    requests: &[ClearanceRequest],
    role: ApproverRole,
) -> Vec<ClearanceRequest> {
    decided_by(requests, role, Decision::InfoRequested)
}

pub fn submitted_by(requests: &[ClearanceRequest], user_id: &str) -> Vec<ClearanceRequest> {
    requests.iter().filter(|r| r.user_id == user_id).cloned().collect()
}

pub fn with_status(requests: &[ClearanceRequest], status: ClearanceStatus) -> Vec<ClearanceRequest> {
    requests.iter().filter(|r| r.status() == status).cloned().collect()
}

fn decided_by(
    requests: &[ClearanceRequest],
    role: ApproverRole,
    decision: Decision,
) -> Vec<ClearanceRequest> {
    requests
        .iter()
        .filter(|r| r.approvals.iter().any(|a| a.role == role && a.status == decision))
        .cloned()
        .collect()
}

/// Highest priority first (unset counts as lowest), newest first within a priority.
pub fn sort_for_display(requests: &mut [ClearanceRequest]) {
    requests.sort_by(|a, b| {
        let rank = |r: &ClearanceRequest| r.priority.map_or(u8::MAX, u8::from);
        rank(a)
            .cmp(&rank(b))
            .then_with(|| b.submitted_at.cmp(&a.submitted_at))
    });
}

pub fn status_summary(requests: &[ClearanceRequest]) -> StatusSummary {
    let mut summary = StatusSummary {
        total: requests.len(),
        ..StatusSummary::default()
    };
    for request in requests {
        match request.status() {
            ClearanceStatus::Pending => summary.pending += 1,
            ClearanceStatus::InfoRequested => summary.info_requested += 1,
            ClearanceStatus::Rejected => summary.rejected += 1,
            ClearanceStatus::Completed => summary.completed += 1,
            ClearanceStatus::Approved => {}
        }
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::clearance::{ClearanceType, Priority, RequestState};
    use crate::workflow::lifecycle::{approve, reject, request_info};
    use chrono::{Duration, TimeZone, Utc};
    use uuid::Uuid;
    use ApproverRole::*;

    fn request(user: &str, chain: &[ApproverRole], day: u32) -> ClearanceRequest {
        ClearanceRequest {
            id: Uuid::new_v4(),
            clearance_type: ClearanceType::LibraryClearance,
            user_id: user.into(),
            user_name: user.to_uppercase(),
            user_program: None,
            submitted_at: Utc.with_ymd_and_hms(2025, 1, day, 12, 0, 0).unwrap(),
            state: RequestState::Pending { current: chain[0] },
            approval_chain: chain.to_vec(),
            approvals: Vec::new(),
            documents: Vec::new(),
            priority: None,
            reason: None,
        }
    }

    fn sample() -> Vec<ClearanceRequest> {
        let now = Utc::now();
        let waiting_library = request("a", &[Library, Finance], 1);
        let waiting_finance = approve(&request("b", &[Library, Finance], 2), Library, None, now)
            .unwrap();
        let rejected = reject(&request("c", &[Library], 3), Library, "Unreturned book", now)
            .unwrap();
        let asked = request_info(&request("a", &[Finance], 4), Finance, "Receipt", now).unwrap();
        let done = approve(&request("d", &[Finance], 5), Finance, None, now).unwrap();
        vec![waiting_library, waiting_finance, rejected, asked, done]
    }

    #[test]
    fn derivations_by_role() {
        let all = sample();
        let users = |v: Vec<ClearanceRequest>| v.into_iter().map(|r| r.user_id).collect::<Vec<_>>();

        assert_eq!(users(pending_for(&all, Library)), vec!["a"]);
        assert_eq!(users(pending_for(&all, Finance)), vec!["b"]);
        assert_eq!(users(approved_by(&all, Library)), vec!["b"]);
        assert_eq!(users(approved_by(&all, Finance)), vec!["d"]);
        assert_eq!(users(rejected_by(&all, Library)), vec!["c"]);
        assert_eq!(users(info_requested_by(&all, Finance)), vec!["a"]);
        assert_eq!(users(submitted_by(&all, "a")).len(), 2);
        assert_eq!(users(with_status(&all, ClearanceStatus::Completed)), vec!["d"]);
    }

    #[test]
    fn derivations_are_idempotent() {
        let all = sample();
        let snapshot = all.clone();
        assert_eq!(pending_for(&all, Library), pending_for(&all, Library));
        assert_eq!(rejected_by(&all, Library), rejected_by(&all, Library));
        assert_eq!(all, snapshot);
    }

    #[test]
    fn summary_counts_each_status() {
        let summary = status_summary(&sample());
        assert_eq!(
            summary,
            StatusSummary { total: 5, pending: 2, info_requested: 1, rejected: 1, completed: 1 }
        );
    }

    #[test]
    fn display_order_uses_priority_then_recency() {
        let mut older_high = request("high", &[Library], 1);
        older_high.priority = Some(Priority::High);
        let mut newer_low = request("low", &[Library], 9);
        newer_low.priority = Some(Priority::Low);
        let unset = request("unset", &[Library], 20);
        let mut newest_high = request("high2", &[Library], 2);
        newest_high.priority = Some(Priority::High);
        newest_high.submitted_at += Duration::hours(1);

        let mut all = vec![unset, newer_low, older_high, newest_high];
        sort_for_display(&mut all);
        let order: Vec<_> = all.iter().map(|r| r.user_id.as_str()).collect();
        assert_eq!(order, vec!["high2", "high", "low", "unset"]);
    }
}
