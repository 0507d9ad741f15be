//! Category to department routing.

use std::collections::HashMap;

use lazy_static::lazy_static;

use crate::models::config::RoutingConfig;

/// Department handling road surface issues.
pub const DEPT_ROADS: &str = "Roads Dept";

/// Department handling waste collection issues.
pub const DEPT_SANITATION: &str = "Sanitation Dept";

/// Department for everything without a dedicated owner.
pub const DEFAULT_DEPARTMENT: &str = "General";

lazy_static! {
    static ref DEFAULT_ROUTER: DepartmentRouter =
        DepartmentRouter::from_config(&RoutingConfig::default());
}

/// Static lookup table from issue category to responsible department.
#[derive(Debug, Clone)]
pub struct DepartmentRouter {
    table: HashMap<String, String>,
    default_department: String,
}

impl DepartmentRouter {
    /// Create an empty router that sends everything to `default_department`.
    pub fn new(default_department: impl Into<String>) -> Self {
        Self {
            table: HashMap::new(),
            default_department: default_department.into(),
        }
    }

    /// Build the table from configuration.
    ///
    /// A category listed under several departments keeps the last one in
    /// department-name order.
    pub fn from_config(config: &RoutingConfig) -> Self {
        config.departments.iter().fold(
            Self::new(config.default_department.clone()),
            |router, (department, categories)| {
                router.with_department(department.clone(), categories.iter().cloned())
            },
        )
    }

    /// Route `categories` to `department`.
    pub fn with_department(
        mut self,
        department: impl Into<String>,
        categories: impl IntoIterator<Item = String>,
    ) -> Self {
        let department = department.into();
        for category in categories {
            self.table.insert(category, department.clone());
        }
        self
    }

    /// Department responsible for `category`.
    pub fn assign(&self, category: &str) -> &str {
        self.table
            .get(category)
            .map(String::as_str)
            .unwrap_or(self.default_department.as_str())
    }

    /// Department used for unmapped categories.
    pub fn default_department(&self) -> &str {
        &self.default_department
    }
}

impl Default for DepartmentRouter {
    fn default() -> Self {
        DEFAULT_ROUTER.clone()
    }
}

/// Department for `category` using the built-in table.
pub fn assign_department(category: &str) -> &'static str {
    DEFAULT_ROUTER.assign(category)
}
