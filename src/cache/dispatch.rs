// ============================================================================
// Update Dispatch Table
// Fid-indexed merge functions, built once per listener type and shared
// ============================================================================

use crate::domain::{FieldValue, Msg};
use crate::errors::DataError;
use crate::fields::FieldDescriptor;
use std::sync::Arc;

/// A stateless merge function for one field: extract the value from the
/// message field and fold it into the listener's cache.
pub type FieldUpdater<C> = fn(&mut C, &FieldValue) -> Result<(), DataError>;

/// Builder for an [`UpdaterTable`].
///
/// Adding an unresolved descriptor (`None`) is a silent no-op: fields the
/// dictionary does not carry simply never dispatch. Callers that need to
/// know about unresolved names must check the field set before building.
pub struct UpdaterTableBuilder<C> {
    slots: Vec<Option<FieldUpdater<C>>>,
}

impl<C> UpdaterTableBuilder<C> {
    pub fn new(max_fid: u16) -> Self {
        Self {
            slots: vec![None; max_fid as usize + 1],
        }
    }

    pub fn add(&mut self, descriptor: Option<&Arc<FieldDescriptor>>, updater: FieldUpdater<C>) {
        let Some(descriptor) = descriptor else {
            return;
        };
        let fid = descriptor.fid() as usize;
        if fid < self.slots.len() {
            self.slots[fid] = Some(updater);
        }
    }

    pub fn build(self) -> UpdaterTable<C> {
        UpdaterTable {
            slots: self.slots.into_boxed_slice(),
        }
    }
}

/// The per-type dispatch table: one slot per fid, read-only after
/// construction and shared by every listener instance of the type.
pub struct UpdaterTable<C> {
    slots: Box<[Option<FieldUpdater<C>>]>,
}

impl<C> UpdaterTable<C> {
    /// Dispatch one field. Returns whether a slot existed for the fid.
    pub fn apply(&self, cache: &mut C, fid: u16, value: &FieldValue) -> Result<bool, DataError> {
        match self.slots.get(fid as usize).copied().flatten() {
            Some(updater) => {
                updater(cache, value).map_err(|e| e.with_fid(fid))?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Drive every field of a message through the table.
    ///
    /// A [`DataError`] from any updater aborts the remaining fields of the
    /// message; the cache keeps whatever was merged before the failure.
    pub fn merge(&self, cache: &mut C, msg: &Msg) -> Result<(), DataError> {
        for (fid, value) in msg.fields() {
            self.apply(cache, fid, value)?;
        }
        Ok(())
    }

    pub fn mapped_fields(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::DeltaField;
    use crate::domain::{FieldType, MsgType};

    #[derive(Default)]
    struct Cache {
        price: DeltaField<rust_decimal::Decimal>,
        volume: DeltaField<u64>,
    }

    fn table() -> UpdaterTable<Cache> {
        let price = Arc::new(FieldDescriptor::new(1, "wPrice", FieldType::Price));
        let volume = Arc::new(FieldDescriptor::new(2, "wVolume", FieldType::U64));

        let mut builder: UpdaterTableBuilder<Cache> = UpdaterTableBuilder::new(10);
        builder.add(Some(&price), |c, v| {
            c.price.update(v.try_price()?);
            Ok(())
        });
        builder.add(Some(&volume), |c, v| {
            c.volume.update(v.try_u64()?);
            Ok(())
        });
        builder.add(None, |_, _| Ok(()));
        builder.build()
    }

    #[test]
    fn test_merge_routes_by_fid() {
        let table = table();
        let mut cache = Cache::default();
        let msg = Msg::new(MsgType::Update)
            .with_field(1, rust_decimal::Decimal::from(10u64))
            .with_field(2, 100u64)
            .with_field(9, "unmapped");

        table.merge(&mut cache, &msg).unwrap();
        assert_eq!(cache.price.get(), rust_decimal::Decimal::from(10u64));
        assert_eq!(cache.volume.get(), 100);
        assert_eq!(table.mapped_fields(), 2);
    }

    #[test]
    fn test_unmapped_fid_is_skipped() {
        let table = table();
        let mut cache = Cache::default();
        assert!(!table
            .apply(&mut cache, 9, &FieldValue::U64(5))
            .unwrap());
    }

    #[test]
    fn test_fid_out_of_range_is_skipped() {
        let table = table();
        let mut cache = Cache::default();
        assert!(!table
            .apply(&mut cache, 5000, &FieldValue::U64(5))
            .unwrap());
    }

    #[test]
    fn test_error_aborts_remaining_fields() {
        let table = table();
        let mut cache = Cache::default();
        let msg = Msg::new(MsgType::Update)
            .with_field(2, "not a number")
            .with_field(1, rust_decimal::Decimal::from(10u64));

        let err = table.merge(&mut cache, &msg).unwrap_err();
        assert_eq!(err.fid(), 2);
        // The price field after the failure was never reached.
        assert!(!cache.price.is_initialised());
    }
}
