//! crates/classroom_cache_core/src/transform.rs
//!
//! Converts a raw classroom snapshot into the course records kept in the cache.
//! This is a pure function: no I/O, no hidden state.

use crate::domain::{ClassroomSnapshot, Course, SnapshotCourse, TeacherKey};
use crate::error::CacheError;
use serde::Deserialize;
use serde_json::Value;

/// Transforms every course of the snapshot, preserving order and count.
///
/// Fails on the first course that cannot be decoded or has no usable `id`;
/// no record is ever dropped.
pub fn transform_snapshot(snapshot: &ClassroomSnapshot) -> Result<Vec<Course>, CacheError> {
    snapshot
        .classrooms
        .iter()
        .enumerate()
        .map(|(index, course)| transform_course(index, course))
        .collect()
}

/// Rejects a snapshot that declares a different owner than the requesting teacher.
pub fn check_snapshot_owner(
    snapshot: &ClassroomSnapshot,
    teacher: &TeacherKey,
) -> Result<(), CacheError> {
    let declared = snapshot
        .teacher
        .as_ref()
        .and_then(|t| t.email.as_deref())
        .map(|email| email.trim().to_lowercase());

    match declared {
        Some(email) if !email.is_empty() && email != teacher.as_str() => {
            Err(CacheError::Validation {
                record: "snapshot".to_string(),
                reason: format!("belongs to {} rather than {}", email, teacher),
            })
        }
        _ => Ok(()),
    }
}

fn transform_course(index: usize, raw: &Value) -> Result<Course, CacheError> {
    let course = SnapshotCourse::deserialize(raw).map_err(|e| CacheError::Validation {
        record: describe_course(index, raw),
        reason: e.to_string(),
    })?;

    let id = match course.id {
        Some(id) if !id.trim().is_empty() => id,
        _ => {
            return Err(CacheError::Validation {
                record: describe_course(index, raw),
                reason: "missing required `id`".to_string(),
            })
        }
    };

    Ok(Course {
        id,
        name: course.name,
        description: course.description,
        status: course.status,
        // The only place nested collections are defaulted: absent or null becomes
        // empty, anything the snapshot carried is kept as-is.
        assignments: course.assignments.unwrap_or_default(),
        students: course.students.unwrap_or_default(),
        submissions: course.submissions.unwrap_or_default(),
        extra: course.extra,
    })
}

fn describe_course(index: usize, raw: &Value) -> String {
    match raw.get("name").and_then(Value::as_str) {
        Some(name) => format!("course #{} ({})", index, name),
        None => format!("course #{}", index),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SnapshotTeacher;
    use serde_json::json;

    fn snapshot(value: serde_json::Value) -> ClassroomSnapshot {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn carries_populated_assignments_through() {
        let input = snapshot(json!({
            "classrooms": [{
                "id": "c1",
                "name": "Algebra",
                "assignments": [{ "id": "a1" }, { "id": "a2", "maxScore": 10 }]
            }]
        }));

        let courses = transform_snapshot(&input).unwrap();

        assert_eq!(
            courses[0].assignments,
            vec![json!({ "id": "a1" }), json!({ "id": "a2", "maxScore": 10 })]
        );
    }

    #[test]
    fn missing_or_null_collections_become_empty() {
        let input = snapshot(json!({
            "classrooms": [{ "id": "c1", "submissions": null }]
        }));

        let course = &transform_snapshot(&input).unwrap()[0];

        assert!(course.students.is_empty());
        assert!(course.assignments.is_empty());
        assert!(course.submissions.is_empty());
    }

    #[test]
    fn preserves_order_and_count() {
        let input = snapshot(json!({
            "classrooms": [{ "id": "z" }, { "id": "a" }, { "id": "m" }]
        }));

        let ids: Vec<_> = transform_snapshot(&input)
            .unwrap()
            .into_iter()
            .map(|c| c.id)
            .collect();

        assert_eq!(ids, ["z", "a", "m"]);
    }

    #[test]
    fn transforming_twice_gives_identical_output() {
        let input = snapshot(json!({
            "classrooms": [{
                "id": "c1",
                "students": [{ "id": "s1" }],
                "submissions": [{ "id": "sub1", "studentId": "s1" }],
                "room": "204"
            }]
        }));

        assert_eq!(
            transform_snapshot(&input).unwrap(),
            transform_snapshot(&input).unwrap()
        );
    }

    #[test]
    fn missing_id_names_the_offending_course() {
        let input = snapshot(json!({
            "classrooms": [{ "id": "c1" }, { "name": "Chemistry" }]
        }));

        match transform_snapshot(&input) {
            Err(CacheError::Validation { record, .. }) => {
                assert_eq!(record, "course #1 (Chemistry)");
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn blank_id_is_rejected() {
        let input = snapshot(json!({ "classrooms": [{ "id": "  " }] }));
        assert!(transform_snapshot(&input).is_err());
    }

    #[test]
    fn ids_are_kept_verbatim() {
        let input = snapshot(json!({ "classrooms": [{ "id": " c1 " }] }));
        assert_eq!(transform_snapshot(&input).unwrap()[0].id, " c1 ");
    }

    #[test]
    fn mistyped_fields_name_the_offending_course() {
        let input = snapshot(json!({
            "classrooms": [
                { "id": "c1" },
                { "id": 42, "name": "Physics" }
            ]
        }));
        match transform_snapshot(&input) {
            Err(CacheError::Validation { record, reason }) => {
                assert_eq!(record, "course #1 (Physics)");
                assert!(reason.contains("42"), "{}", reason);
            }
            other => panic!("expected validation error, got {:?}", other),
        }

        let input = snapshot(json!({
            "classrooms": [{ "id": "c1", "students": "everyone" }]
        }));
        assert!(matches!(
            transform_snapshot(&input),
            Err(CacheError::Validation { record, .. }) if record == "course #0"
        ));
    }

    #[test]
    fn null_course_list_transforms_to_nothing() {
        let input = snapshot(json!({ "classrooms": null }));
        assert!(transform_snapshot(&input).unwrap().is_empty());
    }

    #[test]
    fn owner_check_compares_normalized_emails() {
        let teacher = TeacherKey::parse("teacher@school.example").unwrap();
        let mut input = ClassroomSnapshot {
            teacher: Some(SnapshotTeacher {
                email: Some("Teacher@School.example".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(check_snapshot_owner(&input, &teacher).is_ok());

        input.teacher = Some(SnapshotTeacher {
            email: Some("someone.else@school.example".to_string()),
            ..Default::default()
        });
        assert!(check_snapshot_owner(&input, &teacher).is_err());
    }
}
