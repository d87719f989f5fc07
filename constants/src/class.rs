/// Label written for points that match no component.
pub const UNASSIGNED_LABEL: u8 = 255;

/// Class name written for `UNASSIGNED_LABEL`.
pub const UNASSIGNED_NAME: &str = "unassigned";

/// One entry of the class map.
pub struct ClassInfo {
    /// Label value written to scans and feature arrays.
    pub id: u8,
    /// Class name used in records and file names.
    pub name: &'static str,
}

/// Component classes in their fixed labelling order.
/// Boundary points resolve to the earliest entry, so this order is part of the dataset format.
pub const CLASS_MAP: &[ClassInfo] = &[
    ClassInfo { id: 0, name: "deck" },
    ClassInfo { id: 1, name: "piers" },
    ClassInfo { id: 2, name: "railings" },
    ClassInfo {
        id: 3,
        name: "approach_slabs",
    },
    ClassInfo {
        id: 4,
        name: "back_walls",
    },
    ClassInfo {
        id: 5,
        name: "wing_walls",
    },
];

/// Class name for a label; `unknown` for labels outside the map.
pub fn get_class_name(id: u8) -> String {
    if id == UNASSIGNED_LABEL {
        return UNASSIGNED_NAME.to_string();
    }
    CLASS_MAP
        .iter()
        .find(|c| c.id == id)
        .map_or("unknown", |c| c.name)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_ids_follow_table_order() {
        for (idx, class) in CLASS_MAP.iter().enumerate() {
            assert_eq!(class.id as usize, idx);
        }
    }

    #[test]
    fn unknown_and_unassigned_names() {
        assert_eq!(get_class_name(0), "deck");
        assert_eq!(get_class_name(UNASSIGNED_LABEL), "unassigned");
        assert_eq!(get_class_name(42), "unknown");
    }
}
