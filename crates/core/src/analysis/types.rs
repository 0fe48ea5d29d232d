//! Follow `DW_AT_type` chains to a terminal type.

use tracing::debug;

use crate::error::TypeError;
use crate::model::{
    AttrValue, CompileUnit, DieIndex, AT_DECLARATION, AT_LINKAGE_NAME, AT_NAME, AT_TYPE,
};

pub const TAG_POINTER_TYPE: &str = "DW_TAG_pointer_type";

/// Outcome of resolving the type of one entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeResolution {
    /// Concrete sized terminal; name prefers the linkage name.
    Sized { bits: u64, name: Option<String> },
    /// Terminal pointer with an explicit size; the target is not re-derived.
    Pointer { bits: u64 },
    /// Terminal is a declaration without a defining body.
    Incomplete,
    /// Chain ended without size information, or a lookup failed.
    Unresolved,
}

/// Resolve the type referenced by `entry`, following further references
/// until a terminal entry is reached or `max_chain` hops were taken.
///
/// Absolute `.debug_info` references are reported as
/// [`TypeError::UnsupportedReference`]; every other lookup failure degrades
/// to [`TypeResolution::Unresolved`].
pub fn resolve_type(
    unit: &CompileUnit,
    entry: DieIndex,
    max_chain: usize,
) -> Result<TypeResolution, TypeError> {
    let mut query = entry;
    let mut hops = 0usize;

    loop {
        let Some(die) = unit.get(query) else {
            return Ok(TypeResolution::Unresolved);
        };
        let Some(reference) = die.attr(AT_TYPE) else {
            // Only reachable for the original entry; terminals are handled below.
            return Ok(TypeResolution::Unresolved);
        };
        let target_offset = match reference {
            AttrValue::UnitRef(offset) => *offset,
            AttrValue::DebugInfoRef(offset) => {
                return Err(TypeError::UnsupportedReference { offset: *offset })
            }
            other => {
                debug!(?other, "type attribute is not a reference");
                return Ok(TypeResolution::Unresolved);
            }
        };
        let Some(target) = unit.by_offset(target_offset) else {
            debug!(offset = target_offset, unit = unit.offset, "type reference not found in unit");
            return Ok(TypeResolution::Unresolved);
        };

        hops += 1;
        if hops > max_chain {
            debug!(hops, "type chain exceeded budget");
            return Ok(TypeResolution::Unresolved);
        }

        let type_die = unit.die(target);
        if type_die.has_attr(AT_TYPE) {
            query = target;
            continue;
        }

        if type_die.tag == TAG_POINTER_TYPE {
            return Ok(match type_die.size_in_bits() {
                Some(bits) => TypeResolution::Pointer { bits },
                None => TypeResolution::Unresolved,
            });
        }
        if type_die.has_attr(AT_DECLARATION) {
            return Ok(TypeResolution::Incomplete);
        }
        let Some(bits) = type_die.size_in_bits() else {
            return Ok(TypeResolution::Unresolved);
        };
        let name = type_die
            .attr_str(AT_LINKAGE_NAME)
            .or_else(|| type_die.attr_str(AT_NAME))
            .map(str::to_string);
        return Ok(TypeResolution::Sized { bits, name });
    }
}
