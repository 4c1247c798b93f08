//! # Card Ledger
//!
//! Balance and status rules for a single card. These functions only change a [`Card`] value;
//! the card actor applies them to a staged copy of the record and commits that copy together
//! with the matching transaction, so a change is either fully stored or not at all.

use crate::error::CoreError;
use crate::model::{BlockReason, Card, CardStatus};
use crate::money::Money;

/// What happened when a trip charge (fare or penalty) was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Charge {
    /// Nothing was owed.
    Free,
    Debited,
    /// The debit failed and the card is now blocked.
    Refused { available: Money },
}

fn ensure_positive(amount: Money) -> Result<(), CoreError> {
    if amount.is_positive() {
        Ok(())
    } else {
        Err(CoreError::InvalidAmount(amount))
    }
}

/// Adds `amount` and returns the new balance.
///
/// A card blocked for an unpaid fare is reactivated when `unblock_on_recharge` is set and the
/// credit brings its balance back to zero or above. Administrative blocks stay in place.
pub fn credit(card: &mut Card, amount: Money, unblock_on_recharge: bool) -> Result<Money, CoreError> {
    ensure_positive(amount)?;
    if card.status == CardStatus::Inactive {
        return Err(CoreError::CardNotActive {
            card: card.number.clone(),
            status: card.status,
        });
    }

    card.balance = card
        .balance
        .checked_add(amount)
        .ok_or(CoreError::InvalidAmount(amount))?;
    if unblock_on_recharge
        && card.status == CardStatus::Blocked
        && card.block_reason == Some(BlockReason::FareDebitFailed)
        && !card.balance.is_negative()
    {
        card.activate();
    }
    Ok(card.balance)
}

/// Subtracts `amount` and returns the new balance, or fails without touching the card when
/// the balance plus `overdraft` does not cover it.
pub fn debit(card: &mut Card, amount: Money, overdraft: Money) -> Result<Money, CoreError> {
    ensure_positive(amount)?;
    let available = card
        .balance
        .checked_add(overdraft)
        .ok_or(CoreError::InvalidAmount(overdraft))?;
    if amount > available {
        return Err(CoreError::InsufficientFunds {
            card: card.number.clone(),
            requested: amount,
            available,
            trip: None,
        });
    }
    card.balance = card
        .balance
        .checked_sub(amount)
        .ok_or(CoreError::InvalidAmount(amount))?;
    Ok(card.balance)
}

/// Charges a trip. A refused charge blocks an active card instead of failing the trip.
pub fn charge(card: &mut Card, amount: Money, overdraft: Money) -> Charge {
    if amount.is_zero() {
        return Charge::Free;
    }
    match debit(card, amount, overdraft) {
        Ok(_) => Charge::Debited,
        Err(_) => {
            if card.status == CardStatus::Active {
                card.block(BlockReason::FareDebitFailed);
            }
            Charge::Refused {
                available: card.balance.checked_add(overdraft).unwrap_or(card.balance),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::model::{CardIssue, CardTypeId};
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    fn card(balance_cents: i64) -> Card {
        let issued = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        CardIssue::new("MC-1001", CardTypeId(1), Money::from_cents(balance_cents), issued)
            .into_card()
    }

    #[test]
    fn debit_within_balance() {
        let mut card = card(10000);
        assert_eq!(debit(&mut card, Money::from_cents(3500), Money::ZERO).unwrap(), Money::from_cents(6500));
    }

    #[test]
    fn debit_beyond_balance_leaves_card_untouched() {
        let mut card = card(1000);
        let err = debit(&mut card, Money::from_cents(3500), Money::ZERO).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientFunds);
        assert_eq!(card.balance, Money::from_cents(1000));
        assert_eq!(card.status, CardStatus::Active);
    }

    #[test]
    fn overdraft_extends_what_a_debit_may_take() {
        let mut card = card(1000);
        let balance = debit(&mut card, Money::from_cents(1500), Money::from_cents(500)).unwrap();
        assert_eq!(balance, Money::from_cents(-500));
        assert!(debit(&mut card, Money::from_cents(1), Money::from_cents(500)).is_err());
    }

    #[test]
    fn amounts_must_be_positive() {
        let mut card = card(1000);
        assert_eq!(
            credit(&mut card, Money::ZERO, true).unwrap_err(),
            CoreError::InvalidAmount(Money::ZERO)
        );
        assert_eq!(
            debit(&mut card, Money::from_cents(-5), Money::ZERO).unwrap_err().kind(),
            ErrorKind::InvalidInput
        );
    }

    #[test]
    fn refused_charge_blocks_the_card() {
        let mut card = card(1000);
        let outcome = charge(&mut card, Money::from_cents(3500), Money::ZERO);
        assert_eq!(outcome, Charge::Refused { available: Money::from_cents(1000) });
        assert_eq!(card.status, CardStatus::Blocked);
        assert_eq!(card.block_reason, Some(BlockReason::FareDebitFailed));
        assert_eq!(card.balance, Money::from_cents(1000));
    }

    #[test]
    fn refused_charge_keeps_an_administrative_block() {
        let mut card = card(0);
        card.block(BlockReason::Administrative);
        charge(&mut card, Money::from_cents(500), Money::ZERO);
        assert_eq!(card.block_reason, Some(BlockReason::Administrative));
    }

    #[test]
    fn recharge_lifts_a_fare_block_only() {
        let mut card = card(1000);
        card.block(BlockReason::FareDebitFailed);
        credit(&mut card, Money::from_cents(2500), true).unwrap();
        assert_eq!(card.status, CardStatus::Active);
        assert_eq!(card.block_reason, None);

        card.block(BlockReason::Administrative);
        credit(&mut card, Money::from_cents(100), true).unwrap();
        assert_eq!(card.status, CardStatus::Blocked);
    }

    #[test]
    fn recharge_keeps_block_while_balance_is_negative() {
        let mut card = card(0);
        debit(&mut card, Money::from_cents(500), Money::from_cents(500)).unwrap();
        card.block(BlockReason::FareDebitFailed);
        credit(&mut card, Money::from_cents(200), true).unwrap();
        assert_eq!(card.status, CardStatus::Blocked);
        credit(&mut card, Money::from_cents(300), true).unwrap();
        assert_eq!(card.status, CardStatus::Active);
    }

    #[test]
    fn inactive_card_takes_no_credit() {
        let mut card = card(0);
        card.status = CardStatus::Inactive;
        let err = credit(&mut card, Money::from_cents(100), true).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
    }

    #[test]
    fn overflowing_credit_is_rejected() {
        let mut card = card(0);
        let huge = Money::new(Decimal::MAX);
        card.balance = huge;
        let err = credit(&mut card, huge, true).unwrap_err();
        assert_eq!(err, CoreError::InvalidAmount(huge));
        assert_eq!(card.balance, huge);
    }

    #[test]
    fn overflowing_debit_is_rejected() {
        let mut card = card(0);
        let huge = Money::new(Decimal::MAX);
        card.balance = huge;
        let err = debit(&mut card, Money::from_cents(100), huge).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert_eq!(card.balance, huge);
    }

    #[test]
    fn credit_then_debit_restores_balance() {
        let mut card = card(4200);
        credit(&mut card, Money::from_cents(1234), true).unwrap();
        debit(&mut card, Money::from_cents(1234), Money::ZERO).unwrap();
        assert_eq!(card.balance, Money::from_cents(4200));
    }
}
