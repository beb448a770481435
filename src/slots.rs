//! Positional field-name mapping.  A record holds one reserved key column plus exactly ten
//! attribute columns; logical field names map onto successive attribute columns in the order the
//! caller supplies them.

use zerror_core::ErrorCore;

use crate::Error;

///////////////////////////////////////////// Constants ////////////////////////////////////////////

/// The reserved key column.
pub const KEY_COLUMN: &str = "YCSB_KEY";

/// The fixed attribute columns, in slot order.
pub const ATTRIBUTE_COLUMNS: [&str; 10] = [
    "FIELD0", "FIELD1", "FIELD2", "FIELD3", "FIELD4", "FIELD5", "FIELD6", "FIELD7", "FIELD8",
    "FIELD9",
];

/// The number of attribute columns in every record.
pub const NUM_ATTRIBUTE_COLUMNS: usize = 10;

////////////////////////////////////////////// assign //////////////////////////////////////////////

/// Assign each field, in input order, to the next attribute column starting at slot zero.  The
/// produced mapping is a bijection onto slots `0..fields.len()`.
///
/// The assignment depends on input order, not on the field names: equal field sets supplied in
/// different orders land in different slots.  Callers that need a stable mapping must supply a
/// stable order.
pub fn assign(fields: &[String]) -> Result<Vec<(&str, &'static str)>, Error> {
    if fields.len() > NUM_ATTRIBUTE_COLUMNS {
        return Err(Error::TooManyFields {
            core: ErrorCore::default(),
            fields: fields.len() as u64,
            limit: NUM_ATTRIBUTE_COLUMNS as u64,
        });
    }
    Ok(fields
        .iter()
        .enumerate()
        .map(|(slot, field)| (field.as_str(), ATTRIBUTE_COLUMNS[slot]))
        .collect())
}

/// The slot index of an attribute column name, if it is one.
pub fn slot_of(column: &str) -> Option<usize> {
    ATTRIBUTE_COLUMNS.iter().position(|c| *c == column)
}

/////////////////////////////////////////////// tests //////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(names: &[&str]) -> Vec<String> {
        names.iter().map(|f| f.to_string()).collect()
    }

    #[test]
    fn empty_input_maps_to_nothing() {
        assert!(assign(&[]).unwrap().is_empty());
    }

    #[test]
    fn bijection_onto_leading_slots() {
        let fields = fields(&["a", "b", "c"]);
        let assignment = assign(&fields).unwrap();
        assert_eq!(
            vec![("a", "FIELD0"), ("b", "FIELD1"), ("c", "FIELD2")],
            assignment
        );
        let mut columns: Vec<&str> = assignment.iter().map(|(_, c)| *c).collect();
        columns.dedup();
        assert_eq!(3, columns.len());
    }

    #[test]
    fn ten_fields_fill_every_slot() {
        let fields = fields(&["f0", "f1", "f2", "f3", "f4", "f5", "f6", "f7", "f8", "f9"]);
        let assignment = assign(&fields).unwrap();
        assert_eq!(NUM_ATTRIBUTE_COLUMNS, assignment.len());
        assert_eq!(("f9", "FIELD9"), assignment[9]);
    }

    #[test]
    fn eleven_fields_is_an_error() {
        let fields = fields(&[
            "f0", "f1", "f2", "f3", "f4", "f5", "f6", "f7", "f8", "f9", "f10",
        ]);
        assert!(assign(&fields).is_err());
    }

    // Equal field sets supplied in different orders land in different slots.  Order is the
    // caller's responsibility.
    #[test]
    fn slot_assignment_follows_input_order() {
        let forward = fields(&["a", "b"]);
        let backward = fields(&["b", "a"]);
        let forward = assign(&forward).unwrap();
        let backward = assign(&backward).unwrap();
        assert_eq!(vec![("a", "FIELD0"), ("b", "FIELD1")], forward);
        assert_eq!(vec![("b", "FIELD0"), ("a", "FIELD1")], backward);
    }

    #[test]
    fn slot_of_round_trips() {
        for (slot, column) in ATTRIBUTE_COLUMNS.iter().enumerate() {
            assert_eq!(Some(slot), slot_of(column));
        }
        assert_eq!(None, slot_of(KEY_COLUMN));
        assert_eq!(None, slot_of("FIELD10"));
    }
}
