use std::collections::HashMap;

use rusqlite::Connection;

use crate::{
    Error,
    auth::UserID,
    rule::{RuleId, get_rule},
    transaction::{NewAllocation, TRANSACTION_FROM, TransactionId, insert_allocations, like_pattern},
};

/// Assign the category pair of one of `user_id`'s rules to every transaction whose bank or
/// user description contains the rule's pattern, ignoring ASCII case.
///
/// A matching transaction that is not already allocated to exactly the rule's pair gets a
/// single allocation of its whole amount to that pair. Returns the number of transactions
/// changed, so applying a rule a second time changes nothing and returns zero.
///
/// # Errors
/// Returns [Error::NotFound] if the rule does not belong to the user, or an SQL error in
/// which case no transaction is changed.
pub fn apply_rule(user_id: UserID, rule_id: RuleId, connection: &Connection) -> Result<usize, Error> {
    let rule = get_rule(user_id, rule_id, connection)?;
    let pattern = like_pattern(&rule.pattern);

    let transaction = connection.unchecked_transaction()?;

    let allocations: Vec<(TransactionId, Option<(i64, Option<i64>, f64)>)> = transaction
        .prepare(&format!(
            "SELECT t.id, tc.category_id, tc.subcategory_id, tc.amount {TRANSACTION_FROM}
            LEFT JOIN transaction_category tc ON tc.transaction_id = t.id
            WHERE b.user_id = ?1
                AND (t.description LIKE ?2 ESCAPE '\\'
                    OR COALESCE(t.user_description, '') LIKE ?2 ESCAPE '\\')
            ORDER BY t.id, tc.id"
        ))?
        .query_map((user_id.as_i64(), &pattern), |row| {
            let category_id: Option<i64> = row.get(1)?;
            let allocation = match category_id {
                Some(category_id) => Some((category_id, row.get(2)?, row.get(3)?)),
                None => None,
            };

            Ok((row.get(0)?, allocation))
        })?
        .collect::<Result<_, _>>()?;

    let mut matched: Vec<TransactionId> = Vec::new();
    let mut current: HashMap<TransactionId, Vec<(i64, Option<i64>, f64)>> = HashMap::new();
    for (transaction_id, allocation) in allocations {
        let entry = current.entry(transaction_id).or_insert_with(|| {
            matched.push(transaction_id);
            Vec::new()
        });
        entry.extend(allocation);
    }

    let target = (rule.category_id, rule.subcategory_id);
    let mut affected_count = 0;

    for transaction_id in matched {
        let existing = current.remove(&transaction_id).unwrap_or_default();

        let already_applied = matches!(
            existing.as_slice(),
            [(category_id, subcategory_id, _)] if (*category_id, *subcategory_id) == target
        );
        if already_applied {
            continue;
        }

        let total = existing.iter().map(|(_, _, amount)| amount).sum();

        transaction.execute(
            "DELETE FROM transaction_category WHERE transaction_id = ?1",
            [transaction_id],
        )?;
        insert_allocations(
            transaction_id,
            &[NewAllocation::new(rule.category_id, rule.subcategory_id, total)],
            &transaction,
        )?;
        affected_count += 1;
    }

    transaction.commit()?;

    tracing::info!(
        "Applied rule {rule_id} (\"{}\") to {affected_count} transactions",
        rule.pattern
    );

    Ok(affected_count)
}
