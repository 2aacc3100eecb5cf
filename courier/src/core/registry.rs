//! Fixed registry of asset categories the courier knows how to move.

/// One collectible category, identified on chain by its template id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Category {
    /// Stable key used in configuration quotas and logs.
    pub name: &'static str,
    /// Template id reported by the asset index.
    pub template_id: &'static str,
}

/// Registry order is allocation order: a recipient's batch lists barley first,
/// then corn, and so on.
pub const CATEGORIES: [Category; 6] = [
    Category {
        name: "barley",
        template_id: "318606",
    },
    Category {
        name: "corn",
        template_id: "318607",
    },
    Category {
        name: "fcoin",
        template_id: "260676",
    },
    Category {
        name: "milk",
        template_id: "298593",
    },
    Category {
        name: "barleyseed",
        template_id: "298595",
    },
    Category {
        name: "cornseed",
        template_id: "298596",
    },
];

pub fn by_template(template_id: &str) -> Option<&'static Category> {
    CATEGORIES
        .iter()
        .find(|category| category.template_id == template_id)
}

pub fn by_name(name: &str) -> Option<&'static Category> {
    CATEGORIES.iter().find(|category| category.name == name)
}
