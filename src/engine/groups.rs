//! Group management with the group-busy guard.

use crate::error::{Error, Result};
use crate::types::{Event, GroupName};

use super::TaskEngine;

impl TaskEngine {
    /// Create a group (account table plus audience pool)
    ///
    /// The name is validated before any storage is touched: only ASCII
    /// letters and digits are accepted, and it must not collide with an
    /// existing group in any letter case. Both fail with [`Error::InvalidName`].
    pub async fn create_group(&self, name: &str) -> Result<GroupName> {
        let group = GroupName::parse(name)?;
        self.db.create_group(&group).await?;
        self.emit_event(Event::GroupCreated {
            group: group.to_string(),
        });
        Ok(group)
    }

    /// Drop a group and everything in it
    ///
    /// Refused with [`Error::GroupBusy`] while any task invocation against the
    /// group has not reached a terminal state. The active-group lock is held
    /// for the whole drop so a task cannot start against it meanwhile.
    pub async fn drop_group(&self, name: &str) -> Result<()> {
        let group = GroupName::parse(name)?;

        let active_groups = self.task_state.active_groups.lock().await;
        let active = active_groups.get(&group.key()).copied().unwrap_or(0);
        if active > 0 {
            tracing::warn!(group = %group, active, "Refusing to drop busy group");
            return Err(Error::GroupBusy {
                group: group.to_string(),
                active,
            });
        }

        self.db.drop_group(&group).await?;
        drop(active_groups);

        self.emit_event(Event::GroupDropped {
            group: group.to_string(),
        });
        Ok(())
    }

    /// All groups in creation order
    pub async fn list_groups(&self) -> Result<Vec<GroupName>> {
        self.db.list_groups().await
    }

    /// Whether a group with this name exists (in any letter case)
    pub async fn group_exists(&self, name: &str) -> Result<bool> {
        let group = GroupName::parse(name)?;
        self.db.group_exists(&group).await
    }
}
