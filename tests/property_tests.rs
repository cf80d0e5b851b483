//! Property-based tests for month ordering, invoice derivation and the
//! stock ledger arithmetic.

use chrono::Utc;
use household_api::{
    entities::{
        ingredient,
        meter::{self, MeterKind},
        reading,
        stock_transaction::{self, StockAction},
    },
    models::BillingMonth,
    services::{
        ledger::{crosses_into_critical, derive_quantity},
        readings::invoice_lines,
    },
};
use proptest::prelude::*;

fn month_strategy() -> impl Strategy<Value = BillingMonth> {
    (1u16..=9999, 1u8..=12).prop_map(|(y, m)| BillingMonth::new(y, m).unwrap())
}

fn action_strategy() -> impl Strategy<Value = StockAction> {
    prop_oneof![Just(StockAction::Purchase), Just(StockAction::Consume)]
}

fn meter(id: i32) -> meter::Model {
    meter::Model {
        id,
        nickname: format!("meter-{}", id),
        kind: MeterKind::Electricity,
        tenant: "tenant".to_string(),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn month_order_matches_key_order(a in month_strategy(), b in month_strategy()) {
        prop_assert_eq!(a.cmp(&b), a.key().cmp(&b.key()));
    }

    #[test]
    fn out_of_range_months_are_rejected(year in 0u16..3000, month in 13u8..=99) {
        let raw = format!("{:04}-{:02}", year, month);
        prop_assert!(raw.parse::<BillingMonth>().is_err());
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(300))]

    #[test]
    fn invoice_uses_latest_earlier_reading(
        target in month_strategy(),
        history in prop::collection::btree_map(month_strategy(), -1e6f64..1e6, 0..12),
        current in -1e6f64..1e6,
    ) {
        let mut rows: Vec<reading::Model> = history
            .iter()
            .filter(|(m, _)| **m != target)
            .enumerate()
            .map(|(i, (m, v))| reading::Model {
                id: i as i32 + 2,
                meter_id: 1,
                month: m.key(),
                value: *v,
                recorded_at: Utc::now(),
            })
            .collect();
        rows.push(reading::Model {
            id: 1,
            meter_id: 1,
            month: target.key(),
            value: current,
            recorded_at: Utc::now(),
        });

        let lines = invoice_lines(&[meter(1), meter(2)], &rows, target);
        prop_assert_eq!(lines.len(), 1);

        let expected_last = history
            .range(..target)
            .next_back()
            .map_or(0.0, |(_, v)| *v);
        let line = &lines[0];
        prop_assert_eq!(line.last_value, expected_last);
        prop_assert_eq!(line.current_value, current);
        prop_assert_eq!(line.diff, current - expected_last);
    }

    #[test]
    fn ledger_sum_tracks_running_quantity(
        movements in prop::collection::vec((action_strategy(), 1u32..1000), 0..50),
        critical in 0u32..500,
    ) {
        let mut quantity = 0.0;
        let mut crossings = 0;
        let rows: Vec<stock_transaction::Model> = movements
            .iter()
            .enumerate()
            .map(|(i, (action, amount))| {
                let previous = quantity;
                quantity += action.signed(*amount as f64);
                if crosses_into_critical(previous, quantity, critical as f64) {
                    crossings += 1;
                }
                stock_transaction::Model {
                    id: i as i32 + 1,
                    ingredient_id: 1,
                    user_id: None,
                    action: *action,
                    quantity: *amount as f64,
                    image_ref: None,
                    created_at: Utc::now(),
                }
            })
            .collect();

        prop_assert_eq!(derive_quantity(&rows), quantity);
        if crossings > 0 {
            prop_assert!(movements.iter().any(|(a, _)| *a == StockAction::Consume));
        }
        prop_assert_eq!(
            ingredient::is_critical(quantity, critical as f64),
            quantity <= critical as f64
        );
    }
}
