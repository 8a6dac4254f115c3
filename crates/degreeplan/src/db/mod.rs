/// Database module for degree requirements, plans and evaluation results
mod error;
mod types;

pub use error::RepositoryError;
pub use types::*;

use crate::config::EngineConfig;
use crate::evaluation::{Course, CourseStatus, PlanCourse, PlanRepository, RequirementProgress};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info};

const SCHEMA_SQL: &str = include_str!("../../../../sql/init_plans.sql");

/// Handle to the plan database.
///
/// Open it once at startup with [`PlanDb::open`] and pass it (usually inside an
/// `Arc`) to whatever needs it. [`PlanDb::close`] flushes and releases the
/// connection at shutdown.
pub struct PlanDb {
    db: Mutex<Connection>,
}

impl PlanDb {
    /// Opens the database named in `config` and initializes the schema
    pub fn open(config: &EngineConfig) -> Result<Self, RepositoryError> {
        Self::open_path(
            &config.database_path,
            Duration::from_millis(config.busy_timeout_ms),
        )
    }

    pub fn open_path(path: &Path, busy_timeout: Duration) -> Result<Self, RepositoryError> {
        info!("Opening plan database at {}", path.display());
        let conn = Connection::open(path)?;
        conn.busy_timeout(busy_timeout)?;
        Self::init(conn)
    }

    /// Opens a private in-memory database, mostly useful for tests
    pub fn open_in_memory() -> Result<Self, RepositoryError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, RepositoryError> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.execute_batch(SCHEMA_SQL)?;

        Ok(Self {
            db: Mutex::new(conn),
        })
    }

    /// Closes the underlying connection
    pub fn close(self) -> Result<(), RepositoryError> {
        let conn = self
            .db
            .into_inner()
            .map_err(|e| RepositoryError::Lock {
                message: e.to_string(),
            })?;

        conn.close().map_err(|(_, e)| RepositoryError::from(e))?;
        info!("Plan database closed");
        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, RepositoryError> {
        self.db.lock().map_err(|e| RepositoryError::Lock {
            message: e.to_string(),
        })
    }

    pub fn insert_course(
        &self,
        subject_code: &str,
        catalog_number: &str,
        units: f64,
    ) -> Result<CourseId, RepositoryError> {
        let db = self.conn()?;
        db.execute(
            "INSERT INTO courses (subject_code, catalog_number, units) VALUES (?1, ?2, ?3)",
            params![subject_code, catalog_number, units],
        )?;
        Ok(db.last_insert_rowid())
    }

    pub fn insert_degree(&self, name: &str) -> Result<DegreeId, RepositoryError> {
        let db = self.conn()?;
        db.execute("INSERT INTO degrees (name) VALUES (?1)", [name])?;
        Ok(db.last_insert_rowid())
    }

    pub fn insert_requirement_set(
        &self,
        degree_id: DegreeId,
        name: &str,
        academic_year: Option<i32>,
    ) -> Result<i64, RepositoryError> {
        let db = self.conn()?;
        db.execute(
            "INSERT INTO requirement_sets (degree_id, name, academic_year) VALUES (?1, ?2, ?3)",
            params![degree_id, name, academic_year],
        )?;
        Ok(db.last_insert_rowid())
    }

    /// Inserts a requirement with its course links, substitutions and lists.
    ///
    /// `requirement.requirement_id` and `requirement.set_id` are ignored; the
    /// new row belongs to `set_id` and substitutions are re-scoped to it.
    pub fn insert_requirement(
        &self,
        set_id: i64,
        requirement: &DbRequirement,
    ) -> Result<RequirementId, RepositoryError> {
        let mut db = self.conn()?;
        let tx = db.transaction()?;

        tx.execute(
            "INSERT INTO requirements (
                set_id, name, kind, units_required, courses_required, level_restriction,
                subject_restriction, concentration_kind, min_courses_per_subject,
                min_grade_required, min_average, max_failures, failure_subject_restriction,
                custom_kind, custom_params
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
            params![
                set_id,
                &requirement.name,
                &requirement.kind,
                requirement.units_required,
                requirement.courses_required,
                &requirement.level_restriction,
                &requirement.subject_restriction,
                &requirement.concentration_kind,
                requirement.min_courses_per_subject,
                &requirement.min_grade_required,
                requirement.min_average,
                requirement.max_failures,
                &requirement.failure_subject_restriction,
                &requirement.custom_kind,
                &requirement.custom_params,
            ],
        )?;
        let requirement_id = tx.last_insert_rowid();

        for link in &requirement.course_links {
            tx.execute(
                "INSERT INTO requirement_courses (requirement_id, course_id, is_required)
                 VALUES (?1, ?2, ?3)",
                params![requirement_id, link.course_id, link.is_required],
            )?;
        }

        for sub in &requirement.substitutions {
            tx.execute(
                "INSERT INTO course_substitutions
                    (original_course_id, substitute_course_id, requirement_id)
                 VALUES (?1, ?2, ?3)",
                params![sub.original_course_id, sub.substitute_course_id, requirement_id],
            )?;
        }

        for list in &requirement.lists {
            tx.execute(
                "INSERT INTO requirement_lists (requirement_id, name) VALUES (?1, ?2)",
                params![requirement_id, &list.name],
            )?;
            let list_id = tx.last_insert_rowid();

            for course_id in &list.course_ids {
                tx.execute(
                    "INSERT INTO requirement_list_courses (list_id, course_id) VALUES (?1, ?2)",
                    params![list_id, course_id],
                )?;
            }
        }

        tx.commit()?;
        Ok(requirement_id)
    }

    /// Declares `substitute` as accepted in place of `original` for one requirement
    pub fn insert_substitution(
        &self,
        requirement_id: RequirementId,
        original: CourseId,
        substitute: CourseId,
    ) -> Result<(), RepositoryError> {
        self.conn()?.execute(
            "INSERT OR IGNORE INTO course_substitutions
                (original_course_id, substitute_course_id, requirement_id)
             VALUES (?1, ?2, ?3)",
            params![original, substitute, requirement_id],
        )?;
        Ok(())
    }

    pub fn insert_plan(&self, name: &str, academic_year: Option<i32>) -> Result<PlanId, RepositoryError> {
        let db = self.conn()?;
        db.execute(
            "INSERT INTO plans (name, academic_year) VALUES (?1, ?2)",
            params![name, academic_year],
        )?;
        Ok(db.last_insert_rowid())
    }

    pub fn insert_plan_degree(
        &self,
        plan_id: PlanId,
        degree_id: DegreeId,
    ) -> Result<PlanDegreeId, RepositoryError> {
        let db = self.conn()?;
        db.execute(
            "INSERT INTO plan_degrees (plan_id, degree_id) VALUES (?1, ?2)",
            params![plan_id, degree_id],
        )?;
        Ok(db.last_insert_rowid())
    }

    pub fn insert_plan_course(&self, course: &NewPlanCourse) -> Result<i64, RepositoryError> {
        let db = self.conn()?;
        db.execute(
            "INSERT INTO plan_courses (
                plan_id, course_id, status, grade, numeric_grade, term, term_index
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                course.plan_id,
                course.course_id,
                course.status.as_str(),
                &course.grade,
                course.numeric_grade,
                &course.term,
                course.term_index,
            ],
        )?;
        Ok(db.last_insert_rowid())
    }

    /// Loads links, substitutions and lists for one requirement row
    fn attach_associations(
        db: &Connection,
        requirement: &mut DbRequirement,
    ) -> Result<(), RepositoryError> {
        let id = requirement.requirement_id;

        let mut stmt = db.prepare(
            "SELECT course_id, is_required FROM requirement_courses
             WHERE requirement_id = ? ORDER BY course_id",
        )?;
        requirement.course_links = stmt
            .query_map([id], |row| {
                Ok(DbCourseLink {
                    course_id: row.get(0)?,
                    is_required: row.get(1)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut stmt = db.prepare(
            "SELECT original_course_id, substitute_course_id, requirement_id
             FROM course_substitutions WHERE requirement_id = ?",
        )?;
        requirement.substitutions = stmt
            .query_map([id], |row| {
                Ok(DbSubstitution {
                    original_course_id: row.get(0)?,
                    substitute_course_id: row.get(1)?,
                    requirement_id: row.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut stmt = db.prepare(
            "SELECT list_id, name FROM requirement_lists WHERE requirement_id = ? ORDER BY list_id",
        )?;
        let lists: Vec<(i64, String)> = stmt
            .query_map([id], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut course_stmt = db.prepare(
            "SELECT course_id FROM requirement_list_courses WHERE list_id = ? ORDER BY course_id",
        )?;
        requirement.lists = lists
            .into_iter()
            .map(|(list_id, name)| {
                let course_ids = course_stmt
                    .query_map([list_id], |row| row.get(0))?
                    .collect::<rusqlite::Result<Vec<CourseId>>>()?;
                Ok(DbRequirementList {
                    list_id,
                    name,
                    course_ids,
                })
            })
            .collect::<Result<Vec<_>, RepositoryError>>()?;

        Ok(())
    }
}

/// Raw `plan_courses` row joined against `courses`; the course columns are
/// NULL when the referenced course does not exist.
struct PlanCourseRow {
    plan_course_id: i64,
    course_ref: i64,
    course_id: Option<CourseId>,
    subject_code: Option<String>,
    catalog_number: Option<String>,
    units: Option<f64>,
    status: String,
    grade: Option<String>,
    numeric_grade: Option<f64>,
    term: Option<String>,
    term_index: Option<i64>,
}

impl PlanCourseRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            plan_course_id: row.get(0)?,
            course_ref: row.get(1)?,
            course_id: row.get(2)?,
            subject_code: row.get(3)?,
            catalog_number: row.get(4)?,
            units: row.get(5)?,
            status: row.get(6)?,
            grade: row.get(7)?,
            numeric_grade: row.get(8)?,
            term: row.get(9)?,
            term_index: row.get(10)?,
        })
    }

    fn into_plan_course(self) -> Result<Option<PlanCourse>, RepositoryError> {
        let (Some(course_id), Some(subject_code), Some(catalog_number)) =
            (self.course_id, self.subject_code, self.catalog_number)
        else {
            debug!(
                plan_course_id = self.plan_course_id,
                course_id = self.course_ref,
                "Skipping plan course with unresolved course"
            );
            return Ok(None);
        };

        let status: CourseStatus =
            self.status
                .parse()
                .map_err(|message| RepositoryError::InvalidData {
                    column: "plan_courses.status",
                    message,
                })?;

        Ok(Some(PlanCourse {
            plan_course_id: self.plan_course_id,
            course: Course {
                course_id,
                subject_code,
                catalog_number,
                units: self.units.unwrap_or(0.0),
            },
            status,
            grade: self.grade.filter(|g| !g.trim().is_empty()),
            numeric_grade: self.numeric_grade,
            term: self.term,
            term_index: self.term_index,
        }))
    }
}

impl PlanRepository for PlanDb {
    fn find_plan(&self, plan_id: PlanId) -> Result<Option<DbPlan>, RepositoryError> {
        let db = self.conn()?;
        let plan = db
            .query_row(
                "SELECT plan_id, name, academic_year FROM plans WHERE plan_id = ?",
                [plan_id],
                |row| {
                    Ok(DbPlan {
                        plan_id: row.get(0)?,
                        name: row.get(1)?,
                        academic_year: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(plan)
    }

    fn find_plan_degree(
        &self,
        plan_degree_id: PlanDegreeId,
    ) -> Result<Option<DbPlanDegree>, RepositoryError> {
        let db = self.conn()?;
        let plan_degree = db
            .query_row(
                "SELECT plan_degree_id, plan_id, degree_id FROM plan_degrees
                 WHERE plan_degree_id = ?",
                [plan_degree_id],
                |row| {
                    Ok(DbPlanDegree {
                        plan_degree_id: row.get(0)?,
                        plan_id: row.get(1)?,
                        degree_id: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(plan_degree)
    }

    fn plan_degrees(&self, plan_id: PlanId) -> Result<Vec<DbPlanDegree>, RepositoryError> {
        let db = self.conn()?;
        let mut stmt = db.prepare(
            "SELECT plan_degree_id, plan_id, degree_id FROM plan_degrees
             WHERE plan_id = ? ORDER BY plan_degree_id",
        )?;

        let degrees = stmt
            .query_map([plan_id], |row| {
                Ok(DbPlanDegree {
                    plan_degree_id: row.get(0)?,
                    plan_id: row.get(1)?,
                    degree_id: row.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(degrees)
    }

    fn requirements_for_degree(
        &self,
        degree_id: DegreeId,
        academic_year: Option<i32>,
    ) -> Result<Vec<DbRequirement>, RepositoryError> {
        let db = self.conn()?;

        // a NULL plan year only ever matches year-agnostic sets
        let mut stmt = db.prepare(
            "SELECT r.requirement_id, r.set_id, r.name, r.kind, r.units_required,
                    r.courses_required, r.level_restriction, r.subject_restriction,
                    r.concentration_kind, r.min_courses_per_subject, r.min_grade_required,
                    r.min_average, r.max_failures, r.failure_subject_restriction,
                    r.custom_kind, r.custom_params
             FROM requirements r
             JOIN requirement_sets s ON r.set_id = s.set_id
             WHERE s.degree_id = ?1
               AND (s.academic_year IS NULL OR s.academic_year = ?2)
             ORDER BY r.requirement_id",
        )?;

        let mut requirements = stmt
            .query_map(params![degree_id, academic_year], |row| {
                Ok(DbRequirement {
                    requirement_id: row.get(0)?,
                    set_id: row.get(1)?,
                    name: row.get(2)?,
                    kind: row.get(3)?,
                    units_required: row.get(4)?,
                    courses_required: row.get(5)?,
                    level_restriction: row.get(6)?,
                    subject_restriction: row.get(7)?,
                    concentration_kind: row.get(8)?,
                    min_courses_per_subject: row.get(9)?,
                    min_grade_required: row.get(10)?,
                    min_average: row.get(11)?,
                    max_failures: row.get(12)?,
                    failure_subject_restriction: row.get(13)?,
                    custom_kind: row.get(14)?,
                    custom_params: row.get(15)?,
                    course_links: Vec::new(),
                    substitutions: Vec::new(),
                    lists: Vec::new(),
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        for requirement in &mut requirements {
            Self::attach_associations(&db, requirement)?;
        }

        Ok(requirements)
    }

    fn plan_courses(&self, plan_id: PlanId) -> Result<Vec<PlanCourse>, RepositoryError> {
        let db = self.conn()?;
        let mut stmt = db.prepare(
            "SELECT pc.plan_course_id, pc.course_id, c.course_id, c.subject_code,
                    c.catalog_number, c.units, pc.status, pc.grade, pc.numeric_grade,
                    pc.term, pc.term_index
             FROM plan_courses pc
             LEFT JOIN courses c ON c.course_id = pc.course_id
             WHERE pc.plan_id = ?
             ORDER BY pc.term_index, pc.plan_course_id",
        )?;

        let rows = stmt
            .query_map([plan_id], PlanCourseRow::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut courses = Vec::with_capacity(rows.len());
        for row in rows {
            if let Some(course) = row.into_plan_course()? {
                courses.push(course);
            }
        }
        Ok(courses)
    }

    fn replace_plan_requirements(
        &self,
        plan_degree_id: PlanDegreeId,
        evaluation_id: &str,
        results: &[RequirementProgress],
    ) -> Result<(), RepositoryError> {
        let mut db = self.conn()?;
        let tx = db.transaction()?;
        let evaluated_at = Utc::now();

        {
            let mut upsert = tx.prepare(
                "INSERT INTO plan_requirements (
                    plan_degree_id, requirement_id, status, progress, evaluation_id, evaluated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                ON CONFLICT (plan_degree_id, requirement_id) DO UPDATE SET
                    status = excluded.status,
                    progress = excluded.progress,
                    evaluation_id = excluded.evaluation_id,
                    evaluated_at = excluded.evaluated_at",
            )?;

            for result in results {
                upsert.execute(params![
                    plan_degree_id,
                    result.requirement_id,
                    result.status.as_str(),
                    result.progress,
                    evaluation_id,
                    evaluated_at,
                ])?;
            }
        }

        // rows not touched by this pass belong to requirements that no longer apply
        let pruned = tx.execute(
            "DELETE FROM plan_requirements WHERE plan_degree_id = ?1 AND evaluation_id <> ?2",
            params![plan_degree_id, evaluation_id],
        )?;

        tx.commit()?;

        debug!(
            plan_degree_id = plan_degree_id,
            written = results.len(),
            pruned = pruned,
            "Replaced plan requirement results"
        );
        Ok(())
    }

    fn plan_requirements(
        &self,
        plan_degree_id: PlanDegreeId,
    ) -> Result<Vec<DbPlanRequirement>, RepositoryError> {
        let db = self.conn()?;
        let mut stmt = db.prepare(
            "SELECT plan_degree_id, requirement_id, status, progress, evaluation_id, evaluated_at
             FROM plan_requirements
             WHERE plan_degree_id = ?
             ORDER BY requirement_id",
        )?;

        let rows = stmt
            .query_map([plan_degree_id], |row| {
                Ok(DbPlanRequirement {
                    plan_degree_id: row.get(0)?,
                    requirement_id: row.get(1)?,
                    status: row.get(2)?,
                    progress: row.get(3)?,
                    evaluation_id: row.get(4)?,
                    evaluated_at: row.get(5)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }
}
