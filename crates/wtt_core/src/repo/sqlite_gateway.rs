//! SQLite implementation of the CRM gateway.
//!
//! # Responsibility
//! - Persist kernel objects in the migrated schema and rebuild them with their
//!   identity paths.
//! - Keep SQL details and ordering behavior inside the gateway boundary.
//!
//! # Invariants
//! - Every write stamps `modified_at`/`modified_by` with the configured principal.
//! - Activities created through a creator are assigned to the creator's tracker.
//! - An activity created without a schedule starts and ends at its creation time.

use crate::config::GatewayConfig;
use crate::db::migrations::latest_version;
use crate::model::crm::{
    Activity, ActivityClass, ActivityCreator, ActivityLinkType, ActivityTracker, AuditInfo,
    EntityState, FieldChanges, LegalEntity, NewActivityParams, NewResourceAssignment, NewTracker,
    ObjectPath, Resource, ResourceAssignment, ResourceRole, ACCOUNT_PACKAGE, ACTIVITY_PACKAGE,
};
use crate::repo::crm_gateway::{ActivityScope, CrmGateway, GatewayError, GatewayResult};
use log::{debug, warn};
use rusqlite::{params, Connection, Params, Row, Transaction, TransactionBehavior};
use uuid::Uuid;

const REQUIRED_TABLES: &[&str] = &[
    "accounts",
    "activity_trackers",
    "tracker_account_assignments",
    "activity_creators",
    "activities",
    "activity_links",
    "resources",
    "resource_assignments",
];

const TRACKER_SELECT_SQL: &str = "SELECT
    t.tracker_id AS tracker_id,
    t.name AS name,
    t.description AS description,
    (
        SELECT aa.account_id
        FROM tracker_account_assignments aa
        WHERE aa.tracker_id = t.tracker_id
          AND aa.account_role = 'customer'
        ORDER BY aa.account_id ASC
        LIMIT 1
    ) AS customer_id,
    t.disabled AS disabled,
    t.created_at AS created_at,
    t.created_by AS created_by,
    t.modified_at AS modified_at,
    t.modified_by AS modified_by
FROM activity_trackers t";

const ACCOUNT_SELECT_SQL: &str = "SELECT
    account_id,
    name,
    disabled,
    created_at,
    created_by,
    modified_at,
    modified_by
FROM accounts";

const ACTIVITY_SELECT_SQL: &str = "SELECT
    a.activity_id AS activity_id,
    a.tracker_id AS tracker_id,
    a.name AS name,
    a.description AS description,
    a.scheduled_start AS scheduled_start,
    a.scheduled_end AS scheduled_end,
    a.priority AS priority,
    a.disabled AS disabled,
    a.created_at AS created_at,
    a.created_by AS created_by,
    a.modified_at AS modified_at,
    a.modified_by AS modified_by
FROM activities a";

const RESOURCE_SELECT_SQL: &str = "SELECT
    resource_id,
    name,
    contact_id,
    disabled,
    created_at,
    created_by,
    modified_at,
    modified_by
FROM resources";

const ASSIGNMENT_SELECT_SQL: &str = "SELECT
    ra.assignment_id AS assignment_id,
    ra.activity_id AS activity_id,
    ra.resource_id AS resource_id,
    r.name AS resource_name,
    ra.name AS name,
    ra.resource_role AS resource_role,
    ra.disabled AS disabled,
    ra.created_at AS created_at,
    ra.created_by AS created_by,
    ra.modified_at AS modified_at,
    ra.modified_by AS modified_by
FROM resource_assignments ra
LEFT JOIN resources r ON r.resource_id = ra.resource_id";

/// SQLite-backed CRM gateway bound to one connection.
#[derive(Debug, Clone)]
pub struct SqliteCrmGateway<'conn> {
    conn: &'conn Connection,
    config: GatewayConfig,
    activity_root: ObjectPath,
    account_root: ObjectPath,
}

impl<'conn> SqliteCrmGateway<'conn> {
    /// Creates a gateway from a migrated connection.
    pub fn try_new(conn: &'conn Connection, config: GatewayConfig) -> GatewayResult<Self> {
        ensure_gateway_connection_ready(conn)?;
        let activity_root = ObjectPath::segment_root(
            ACTIVITY_PACKAGE,
            &config.provider_name,
            &config.segment_name,
        );
        let account_root =
            ObjectPath::segment_root(ACCOUNT_PACKAGE, &config.provider_name, &config.segment_name);
        Ok(Self {
            conn,
            config,
            activity_root,
            account_root,
        })
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    fn principal(&self) -> &str {
        self.config.principal.as_str()
    }

    fn query_rows<T, P, F>(&self, sql: &str, params: P, parse: F) -> GatewayResult<Vec<T>>
    where
        P: Params,
        F: Fn(&Row<'_>) -> GatewayResult<T>,
    {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(params)?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse(row)?);
        }
        Ok(items)
    }

    fn query_first<T, P, F>(&self, sql: &str, params: P, parse: F) -> GatewayResult<Option<T>>
    where
        P: Params,
        F: Fn(&Row<'_>) -> GatewayResult<T>,
    {
        Ok(self.query_rows(sql, params, parse)?.into_iter().next())
    }

    fn parse_tracker_row(&self, row: &Row<'_>) -> GatewayResult<ActivityTracker> {
        let tracker_id: String = row.get("tracker_id")?;
        Ok(ActivityTracker {
            path: self
                .activity_root
                .descendant(&["activityTracker", tracker_id.as_str()]),
            name: row.get("name")?,
            description: row.get("description")?,
            customer_id: row.get("customer_id")?,
            state: parse_state(row, "activity_trackers")?,
            audit: parse_audit(row)?,
        })
    }

    fn parse_account_row(&self, row: &Row<'_>) -> GatewayResult<LegalEntity> {
        let account_id: String = row.get("account_id")?;
        Ok(LegalEntity {
            path: self.account_root.descendant(&["account", account_id.as_str()]),
            name: row.get("name")?,
            state: parse_state(row, "accounts")?,
            audit: parse_audit(row)?,
        })
    }

    fn parse_activity_row(&self, row: &Row<'_>) -> GatewayResult<Activity> {
        let activity_id: String = row.get("activity_id")?;
        Ok(Activity {
            path: self.activity_root.descendant(&["activity", activity_id.as_str()]),
            tracker_id: row.get("tracker_id")?,
            name: row.get("name")?,
            description: row.get("description")?,
            scheduled_start: row.get("scheduled_start")?,
            scheduled_end: row.get("scheduled_end")?,
            priority: row.get("priority")?,
            state: parse_state(row, "activities")?,
            audit: parse_audit(row)?,
        })
    }

    fn parse_resource_row(&self, row: &Row<'_>) -> GatewayResult<Resource> {
        let resource_id: String = row.get("resource_id")?;
        Ok(Resource {
            path: self.activity_root.descendant(&["resource", resource_id.as_str()]),
            name: row.get("name")?,
            contact_id: row.get("contact_id")?,
            state: parse_state(row, "resources")?,
            audit: parse_audit(row)?,
        })
    }

    fn parse_assignment_row(&self, row: &Row<'_>) -> GatewayResult<ResourceAssignment> {
        let assignment_id: String = row.get("assignment_id")?;
        let activity_id: String = row.get("activity_id")?;
        let role_text: String = row.get("resource_role")?;
        let role = ResourceRole::parse(&role_text).ok_or_else(|| {
            GatewayError::InvalidData(format!(
                "invalid resource role `{role_text}` in resource_assignments.resource_role"
            ))
        })?;
        Ok(ResourceAssignment {
            path: self.activity_root.descendant(&[
                "activity",
                activity_id.as_str(),
                "assignedResource",
                assignment_id.as_str(),
            ]),
            activity_id,
            resource_id: row.get("resource_id")?,
            resource_name: row.get("resource_name")?,
            name: row.get("name")?,
            role,
            state: parse_state(row, "resource_assignments")?,
            audit: parse_audit(row)?,
        })
    }

    fn load_required_activity(&self, activity_id: &str) -> GatewayResult<Activity> {
        self.find_activity(activity_id)?
            .ok_or_else(|| not_found("activity", activity_id))
    }
}

impl CrmGateway for SqliteCrmGateway<'_> {
    fn transaction<T, F>(&self, body: F) -> GatewayResult<T>
    where
        Self: Sized,
        F: FnOnce(&Self) -> GatewayResult<T>,
    {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        match body(self) {
            Ok(value) => {
                tx.commit()?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback() {
                    warn!(
                        "event=tx_rollback module=gateway status=error error={} cause={}",
                        rollback_err, err
                    );
                } else {
                    debug!("event=tx_rollback module=gateway status=ok cause={err}");
                }
                Err(err)
            }
        }
    }

    fn find_tracker(&self, tracker_id: &str) -> GatewayResult<Option<ActivityTracker>> {
        self.query_first(
            &format!(
                "{TRACKER_SELECT_SQL}
                 WHERE t.tracker_id = ?1
                   AND t.tracker_type = 'customer_project_group';"
            ),
            [tracker_id],
            |row| self.parse_tracker_row(row),
        )
    }

    fn list_customer_project_groups(
        &self,
        include_disabled: bool,
    ) -> GatewayResult<Vec<ActivityTracker>> {
        self.query_rows(
            &format!(
                "{TRACKER_SELECT_SQL}
                 WHERE t.tracker_type = 'customer_project_group'
                   AND (?1 = 1 OR t.disabled = 0)
                 ORDER BY t.name ASC, t.tracker_id ASC;"
            ),
            [bool_to_int(include_disabled)],
            |row| self.parse_tracker_row(row),
        )
    }

    fn create_customer_project_group(
        &self,
        tracker: &NewTracker,
        customer: &LegalEntity,
    ) -> GatewayResult<ActivityTracker> {
        let tracker_id = new_uid();
        self.conn.execute(
            "INSERT INTO activity_trackers (
                tracker_id,
                tracker_type,
                name,
                description,
                disabled,
                created_by,
                modified_by
            ) VALUES (?1, 'customer_project_group', ?2, ?3, 0, ?4, ?4);",
            params![
                tracker_id,
                tracker.name.as_str(),
                tracker.description.as_deref(),
                self.principal(),
            ],
        )?;
        self.conn.execute(
            "INSERT INTO tracker_account_assignments (tracker_id, account_id, account_role)
             VALUES (?1, ?2, 'customer');",
            params![tracker_id, customer.path.last_segment()],
        )?;
        self.conn.execute(
            "INSERT INTO activity_creators (creator_id, tracker_id, name, activity_class)
             VALUES (?1, ?2, ?3, ?4);",
            params![
                new_uid(),
                tracker_id,
                format!("{} ~ Incidents", tracker.name),
                ActivityClass::Incident.as_db(),
            ],
        )?;
        self.find_tracker(&tracker_id)?
            .ok_or_else(|| not_found("activity tracker", &tracker_id))
    }

    fn update_tracker(&self, tracker_id: &str, changes: &FieldChanges) -> GatewayResult<()> {
        let changed = self.conn.execute(
            "UPDATE activity_trackers
             SET name = ?2,
                 description = ?3,
                 modified_at = (strftime('%s', 'now') * 1000),
                 modified_by = ?4
             WHERE tracker_id = ?1;",
            params![
                tracker_id,
                changes.name.as_str(),
                changes.description.as_deref(),
                self.principal(),
            ],
        )?;
        ensure_changed(changed, "activity tracker", tracker_id)
    }

    fn set_tracker_state(&self, tracker_id: &str, state: EntityState) -> GatewayResult<()> {
        let changed = self.conn.execute(
            "UPDATE activity_trackers
             SET disabled = ?2,
                 modified_at = (strftime('%s', 'now') * 1000),
                 modified_by = ?3
             WHERE tracker_id = ?1;",
            params![
                tracker_id,
                bool_to_int(state.is_disabled()),
                self.principal()
            ],
        )?;
        ensure_changed(changed, "activity tracker", tracker_id)
    }

    fn find_legal_entity(&self, account_id: &str) -> GatewayResult<Option<LegalEntity>> {
        self.query_first(
            &format!(
                "{ACCOUNT_SELECT_SQL}
                 WHERE account_id = ?1
                   AND kind = 'legal_entity';"
            ),
            [account_id],
            |row| self.parse_account_row(row),
        )
    }

    fn find_legal_entity_by_name(&self, name: &str) -> GatewayResult<Option<LegalEntity>> {
        self.query_first(
            &format!(
                "{ACCOUNT_SELECT_SQL}
                 WHERE name = ?1
                   AND kind = 'legal_entity'
                   AND disabled = 0
                 ORDER BY created_at ASC, rowid ASC
                 LIMIT 1;"
            ),
            [name],
            |row| self.parse_account_row(row),
        )
    }

    fn create_legal_entity(&self, name: &str) -> GatewayResult<LegalEntity> {
        let account_id = new_uid();
        self.conn.execute(
            "INSERT INTO accounts (account_id, kind, name, disabled, created_by, modified_by)
             VALUES (?1, 'legal_entity', ?2, 0, ?3, ?3);",
            params![account_id, name, self.principal()],
        )?;
        self.find_legal_entity(&account_id)?
            .ok_or_else(|| not_found("legal entity", &account_id))
    }

    fn find_activity(&self, activity_id: &str) -> GatewayResult<Option<Activity>> {
        self.query_first(
            &format!("{ACTIVITY_SELECT_SQL} WHERE a.activity_id = ?1;"),
            [activity_id],
            |row| self.parse_activity_row(row),
        )
    }

    fn list_tracker_activities(
        &self,
        tracker_id: &str,
        scope: ActivityScope,
        include_disabled: bool,
    ) -> GatewayResult<Vec<Activity>> {
        let scope_filter = match scope {
            ActivityScope::TopLevel => {
                "AND NOT EXISTS (
                    SELECT 1
                    FROM activity_links l
                    JOIN activities p ON p.activity_id = l.to_activity_id
                    WHERE l.from_activity_id = a.activity_id
                      AND l.link_type = 'is_child_of'
                      AND p.tracker_id = a.tracker_id
                )"
            }
            ActivityScope::All => "",
        };
        self.query_rows(
            &format!(
                "{ACTIVITY_SELECT_SQL}
                 WHERE a.tracker_id = ?1
                   AND (?2 = 1 OR a.disabled = 0)
                   {scope_filter}
                 ORDER BY a.name ASC, a.activity_id ASC;"
            ),
            params![tracker_id, bool_to_int(include_disabled)],
            |row| self.parse_activity_row(row),
        )
    }

    fn list_linked_activities(
        &self,
        target_id: &str,
        link_type: ActivityLinkType,
        include_disabled: bool,
    ) -> GatewayResult<Vec<Activity>> {
        self.query_rows(
            &format!(
                "{ACTIVITY_SELECT_SQL}
                 WHERE EXISTS (
                     SELECT 1
                     FROM activity_links l
                     WHERE l.from_activity_id = a.activity_id
                       AND l.to_activity_id = ?1
                       AND l.link_type = ?2
                 )
                   AND (?3 = 1 OR a.disabled = 0)
                 ORDER BY a.name ASC, a.activity_id ASC;"
            ),
            params![target_id, link_type.as_db(), bool_to_int(include_disabled)],
            |row| self.parse_activity_row(row),
        )
    }

    fn find_activity_creator(
        &self,
        tracker_id: &str,
        activity_class: ActivityClass,
    ) -> GatewayResult<Option<ActivityCreator>> {
        self.query_first(
            "SELECT creator_id, tracker_id, name, activity_class
             FROM activity_creators
             WHERE tracker_id = ?1
               AND activity_class = ?2
             ORDER BY created_at ASC, creator_id ASC
             LIMIT 1;",
            params![tracker_id, activity_class.as_db()],
            |row| {
                let creator_id: String = row.get("creator_id")?;
                let class_text: String = row.get("activity_class")?;
                let activity_class = ActivityClass::parse(&class_text).ok_or_else(|| {
                    GatewayError::InvalidData(format!(
                        "invalid activity class `{class_text}` in activity_creators.activity_class"
                    ))
                })?;
                Ok(ActivityCreator {
                    path: self
                        .activity_root
                        .descendant(&["activityCreator", creator_id.as_str()]),
                    tracker_id: row.get("tracker_id")?,
                    name: row.get("name")?,
                    activity_class,
                })
            },
        )
    }

    fn new_activity(
        &self,
        creator: &ActivityCreator,
        params: &NewActivityParams,
    ) -> GatewayResult<Activity> {
        let activity_id = new_uid();
        self.conn.execute(
            "INSERT INTO activities (
                activity_id,
                tracker_id,
                creator_id,
                name,
                description,
                scheduled_start,
                scheduled_end,
                priority,
                disabled,
                created_by,
                modified_by
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5,
                COALESCE(?6, strftime('%s', 'now') * 1000),
                COALESCE(?7, strftime('%s', 'now') * 1000),
                ?8, 0, ?9, ?9
            );",
            params![
                activity_id,
                creator.tracker_id.as_str(),
                creator.id(),
                params.name.as_str(),
                params.description.as_deref(),
                params.scheduled_start,
                params.scheduled_end,
                params.priority,
                self.principal(),
            ],
        )?;
        self.load_required_activity(&activity_id)
    }

    fn link_activities(
        &self,
        from_id: &str,
        to_id: &str,
        link_type: ActivityLinkType,
    ) -> GatewayResult<()> {
        self.conn.execute(
            "INSERT INTO activity_links (link_id, from_activity_id, to_activity_id, link_type)
             VALUES (?1, ?2, ?3, ?4);",
            params![new_uid(), from_id, to_id, link_type.as_db()],
        )?;
        Ok(())
    }

    fn update_activity(&self, activity_id: &str, changes: &FieldChanges) -> GatewayResult<()> {
        let changed = self.conn.execute(
            "UPDATE activities
             SET name = ?2,
                 description = ?3,
                 modified_at = (strftime('%s', 'now') * 1000),
                 modified_by = ?4
             WHERE activity_id = ?1;",
            params![
                activity_id,
                changes.name.as_str(),
                changes.description.as_deref(),
                self.principal(),
            ],
        )?;
        ensure_changed(changed, "activity", activity_id)
    }

    fn set_activity_state(&self, activity_id: &str, state: EntityState) -> GatewayResult<()> {
        let changed = self.conn.execute(
            "UPDATE activities
             SET disabled = ?2,
                 modified_at = (strftime('%s', 'now') * 1000),
                 modified_by = ?3
             WHERE activity_id = ?1;",
            params![
                activity_id,
                bool_to_int(state.is_disabled()),
                self.principal()
            ],
        )?;
        ensure_changed(changed, "activity", activity_id)
    }

    fn find_resource(&self, resource_id: &str) -> GatewayResult<Option<Resource>> {
        self.query_first(
            &format!("{RESOURCE_SELECT_SQL} WHERE resource_id = ?1;"),
            [resource_id],
            |row| self.parse_resource_row(row),
        )
    }

    fn create_resource(&self, name: &str, contact_id: Option<&str>) -> GatewayResult<Resource> {
        let resource_id = new_uid();
        self.conn.execute(
            "INSERT INTO resources (resource_id, name, contact_id, disabled, created_by, modified_by)
             VALUES (?1, ?2, ?3, 0, ?4, ?4);",
            params![resource_id, name, contact_id, self.principal()],
        )?;
        self.find_resource(&resource_id)?
            .ok_or_else(|| not_found("resource", &resource_id))
    }

    fn list_resource_assignments(
        &self,
        activity_id: &str,
        include_disabled: bool,
    ) -> GatewayResult<Vec<ResourceAssignment>> {
        self.query_rows(
            &format!(
                "{ASSIGNMENT_SELECT_SQL}
                 WHERE ra.activity_id = ?1
                   AND (?2 = 1 OR ra.disabled = 0)
                 ORDER BY ra.rowid ASC;"
            ),
            params![activity_id, bool_to_int(include_disabled)],
            |row| self.parse_assignment_row(row),
        )
    }

    fn find_resource_assignment(
        &self,
        activity_id: &str,
        assignment_id: &str,
    ) -> GatewayResult<Option<ResourceAssignment>> {
        self.query_first(
            &format!(
                "{ASSIGNMENT_SELECT_SQL}
                 WHERE ra.activity_id = ?1
                   AND ra.assignment_id = ?2;"
            ),
            params![activity_id, assignment_id],
            |row| self.parse_assignment_row(row),
        )
    }

    fn create_resource_assignment(
        &self,
        activity_id: &str,
        assignment: &NewResourceAssignment,
    ) -> GatewayResult<ResourceAssignment> {
        let assignment_id = new_uid();
        self.conn.execute(
            "INSERT INTO resource_assignments (
                assignment_id,
                activity_id,
                resource_id,
                name,
                resource_role,
                disabled,
                created_by,
                modified_by
            ) VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6, ?6);",
            params![
                assignment_id,
                activity_id,
                assignment.resource_id.as_deref(),
                assignment.name.as_str(),
                assignment.role.as_db(),
                self.principal(),
            ],
        )?;
        self.find_resource_assignment(activity_id, &assignment_id)?
            .ok_or_else(|| not_found("resource assignment", &assignment_id))
    }

    fn set_resource_assignment_state(
        &self,
        activity_id: &str,
        assignment_id: &str,
        state: EntityState,
    ) -> GatewayResult<()> {
        let changed = self.conn.execute(
            "UPDATE resource_assignments
             SET disabled = ?3,
                 modified_at = (strftime('%s', 'now') * 1000),
                 modified_by = ?4
             WHERE activity_id = ?1
               AND assignment_id = ?2;",
            params![
                activity_id,
                assignment_id,
                bool_to_int(state.is_disabled()),
                self.principal(),
            ],
        )?;
        ensure_changed(changed, "resource assignment", assignment_id)
    }
}

/// Generates a kernel object id.
fn new_uid() -> String {
    Uuid::new_v4().simple().to_string().to_uppercase()
}

fn not_found(kind: &'static str, id: &str) -> GatewayError {
    GatewayError::NotFound {
        kind,
        id: id.to_string(),
    }
}

fn ensure_changed(changed: usize, kind: &'static str, id: &str) -> GatewayResult<()> {
    if changed == 0 {
        return Err(not_found(kind, id));
    }
    Ok(())
}

fn parse_state(row: &Row<'_>, table: &'static str) -> GatewayResult<EntityState> {
    match row.get::<_, i64>("disabled")? {
        flag @ (0 | 1) => Ok(EntityState::from_disabled_flag(flag == 1)),
        other => Err(GatewayError::InvalidData(format!(
            "invalid disabled value `{other}` in {table}.disabled"
        ))),
    }
}

fn parse_audit(row: &Row<'_>) -> GatewayResult<AuditInfo> {
    Ok(AuditInfo {
        created_at: row.get("created_at")?,
        created_by: row.get("created_by")?,
        modified_at: row.get("modified_at")?,
        modified_by: row.get("modified_by")?,
    })
}

fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}

fn ensure_gateway_connection_ready(conn: &Connection) -> GatewayResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(GatewayError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    for table in REQUIRED_TABLES {
        if !table_exists(conn, table)? {
            return Err(GatewayError::MissingRequiredTable(*table));
        }
    }
    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> GatewayResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}
