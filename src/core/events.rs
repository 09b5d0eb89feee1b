use super::types::{AppliedCashEvent, CashEvent, CashEventKind};

/// Balance state touched by cash events at a year boundary.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Ledger {
    pub balance: f64,
    pub cumulative_invested: f64,
}

/// Applies every event scheduled for `year` in list order. Withdrawals are
/// clamped to the available balance and never reduce `cumulative_invested`.
pub(crate) fn apply_cash_events(
    ledger: &mut Ledger,
    events: &[CashEvent],
    year: u32,
) -> Option<AppliedCashEvent> {
    let mut applied: Option<AppliedCashEvent> = None;

    for event in events.iter().filter(|e| e.year_index == year) {
        let amount = event.amount.max(0.0);
        let signed = match event.kind {
            CashEventKind::Addition => {
                ledger.balance += amount;
                ledger.cumulative_invested += amount;
                amount
            }
            CashEventKind::Withdrawal => {
                let taken = amount.min(ledger.balance);
                ledger.balance = (ledger.balance - taken).max(0.0);
                -taken
            }
        };

        let net_amount = applied.as_ref().map_or(0.0, |a| a.net_amount) + signed;
        applied = Some(AppliedCashEvent {
            net_amount,
            label: event.label.clone(),
            kind: event.kind,
        });
    }

    applied
}

/// Splits a timeline's events at the accumulation boundary. Boundary-year
/// events stay with accumulation.
pub(crate) fn split_at_transition(
    events: &[CashEvent],
    transition_year: u32,
) -> (Vec<CashEvent>, Vec<CashEvent>) {
    events
        .iter()
        .cloned()
        .partition(|e| e.year_index <= transition_year)
}
