//! Project / sub-project context chosen by the operator before capture.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SelectionError {
    #[error("no project selected")]
    MissingProject,
    #[error("no sub-project selected")]
    MissingSubProject,
}

/// The operator's current site choice. Both ids stay `None` until picked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub project_id: Option<i64>,
    pub sub_project_id: Option<i64>,
}

/// A selection with both ids present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChosenSite {
    pub project_id: i64,
    pub sub_project_id: i64,
}

impl Selection {
    pub fn new(project_id: i64, sub_project_id: i64) -> Self {
        Self {
            project_id: Some(project_id),
            sub_project_id: Some(sub_project_id),
        }
    }

    /// Resolve to a [`ChosenSite`], or report which id is still missing.
    pub fn chosen(&self) -> Result<ChosenSite, SelectionError> {
        let project_id = self.project_id.ok_or(SelectionError::MissingProject)?;
        let sub_project_id = self
            .sub_project_id
            .ok_or(SelectionError::MissingSubProject)?;
        Ok(ChosenSite {
            project_id,
            sub_project_id,
        })
    }

    pub fn is_complete(&self) -> bool {
        self.chosen().is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_selection_reports_project_first() {
        assert_eq!(
            Selection::default().chosen(),
            Err(SelectionError::MissingProject)
        );
    }

    #[test]
    fn project_without_sub_project_is_incomplete() {
        let sel = Selection {
            project_id: Some(3),
            sub_project_id: None,
        };
        assert_eq!(sel.chosen(), Err(SelectionError::MissingSubProject));
        assert!(!sel.is_complete());
    }

    #[test]
    fn complete_selection_resolves() {
        let site = Selection::new(3, 7).chosen().unwrap();
        assert_eq!(site.project_id, 3);
        assert_eq!(site.sub_project_id, 7);
    }
}
