//! Execution order for retrieved units.

use super::unit::ExecutionUnit;

/// Sorts units ascending by their ordering key.
///
/// The sort is stable: units sharing an order keep their retrieval sequence,
/// which the server relies on when it assigns the same order to several
/// characterizations.
pub fn order_units(mut units: Vec<ExecutionUnit>) -> Vec<ExecutionUnit> {
    units.sort_by_key(ExecutionUnit::order);
    units
}
