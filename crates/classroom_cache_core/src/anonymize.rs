//! crates/classroom_cache_core/src/anonymize.rs
//!
//! Rewrites a classroom snapshot document so it can be checked in as a test
//! fixture: real names, emails, student numbers and links are replaced by
//! stable fake values. The output is deterministic for a given input.

use serde_json::{json, Map, Value};
use std::collections::{HashMap, HashSet};

const FIRST_NAMES: &[&str] = &[
    "Alice", "Bob", "Charlie", "Diana", "Emma", "Frank", "Grace", "Henry", "Isabella", "Jack",
    "Kate", "Liam", "Maya", "Noah", "Olivia", "Peter", "Quinn", "Rachel", "Sam", "Tara", "Uma",
    "Victor", "Wendy", "Xavier", "Yara", "Zoe",
];

const LAST_NAMES: &[&str] = &[
    "Anderson", "Brown", "Clark", "Davis", "Evans", "Foster", "Garcia", "Harris", "Irving",
    "Johnson", "King", "Lopez", "Miller", "Nelson", "Owen", "Parker", "Roberts", "Smith",
    "Taylor", "Underwood", "Valdez", "Williams", "Young", "Zhang",
];

const URL_FIELDS: &[&str] = &[
    "alternateLink",
    "formUrl",
    "responseUrl",
    "thumbnailUrl",
    "photoUrl",
];

const FALLBACK_UPDATED_AT: &str = "2025-01-15T12:00:00.000Z";

/// Who to hide and what to replace them with.
#[derive(Debug, Clone)]
pub struct AnonymizeOptions {
    /// The real teacher email, if it appears in the document.
    pub teacher_email: Option<String>,
    /// Display names the teacher appears under.
    pub teacher_names: Vec<String>,
    pub replacement_teacher_email: String,
    pub replacement_teacher_name: String,
    /// Students have `<digits>@<student_domain>` addresses.
    pub student_domain: String,
}

impl Default for AnonymizeOptions {
    fn default() -> Self {
        Self {
            teacher_email: None,
            teacher_names: Vec::new(),
            replacement_teacher_email: "teacher@example.com".to_string(),
            replacement_teacher_name: "Test Teacher".to_string(),
            student_domain: "students.example.org".to_string(),
        }
    }
}

/// Returns an anonymized copy of `document`.
pub fn anonymize_snapshot(document: &Value, options: &AnonymizeOptions) -> Value {
    let mut anonymizer = Anonymizer::new(options);
    anonymizer.collect(document);
    anonymizer.replace(document)
}

struct Anonymizer<'a> {
    options: &'a AnonymizeOptions,
    names: HashMap<String, String>,
    student_numbers: HashMap<String, String>,
    student_ids: HashMap<String, String>,
    used_names: HashSet<String>,
}

impl<'a> Anonymizer<'a> {
    fn new(options: &'a AnonymizeOptions) -> Self {
        let names = options
            .teacher_names
            .iter()
            .map(|name| (name.clone(), options.replacement_teacher_name.clone()))
            .collect();

        Self {
            options,
            names,
            student_numbers: HashMap::new(),
            student_ids: HashMap::new(),
            used_names: HashSet::new(),
        }
    }

    //=====================================================================================
    // Pass 1: collect identifiers
    //=====================================================================================

    fn collect(&mut self, value: &Value) {
        match value {
            Value::Object(object) => {
                self.collect_person(object, "name", "email");
                self.collect_person(object, "studentName", "studentEmail");

                if let Some(number) = object
                    .get("email")
                    .and_then(Value::as_str)
                    .and_then(|email| self.student_number(email))
                {
                    self.map_student_number(number);
                }

                if let Some(id) = object.get("studentId").and_then(Value::as_str) {
                    if !self.student_ids.contains_key(id) {
                        let fake = fake_student_id(self.student_ids.len() + 1, id.len());
                        self.student_ids.insert(id.to_string(), fake);
                    }
                }

                for nested in object.values() {
                    self.collect(nested);
                }
            }
            Value::Array(items) => items.iter().for_each(|item| self.collect(item)),
            _ => {}
        }
    }

    fn collect_person(&mut self, object: &Map<String, Value>, name_key: &str, email_key: &str) {
        let (Some(name), Some(email)) = (
            object.get(name_key).and_then(Value::as_str),
            object.get(email_key).and_then(Value::as_str),
        ) else {
            return;
        };
        let Some(number) = self.student_number(email) else {
            return;
        };

        if !self.names.contains_key(name) {
            let fake = self.fake_name(self.names.len());
            self.names.insert(name.to_string(), fake);
        }
        self.map_student_number(number);
    }

    fn map_student_number(&mut self, number: String) {
        self.student_numbers
            .entry(number)
            .or_insert_with_key(|n| n.chars().rev().collect());
    }

    /// The digit local part of a student address, if `email` is one.
    fn student_number(&self, email: &str) -> Option<String> {
        let (local, domain) = email.split_once('@')?;
        let is_student = domain.eq_ignore_ascii_case(&self.options.student_domain)
            && !local.is_empty()
            && local.chars().all(|c| c.is_ascii_digit());
        is_student.then(|| local.to_string())
    }

    fn fake_name(&mut self, index: usize) -> String {
        let first = FIRST_NAMES[index % FIRST_NAMES.len()];
        for attempt in 0..LAST_NAMES.len() {
            let last = LAST_NAMES[(index + attempt) % LAST_NAMES.len()];
            let candidate = format!("{} {}", first, last);
            if self.used_names.insert(candidate.clone()) {
                return candidate;
            }
        }
        let last = LAST_NAMES[index % LAST_NAMES.len()];
        format!("{} {}{}", first, last, index)
    }

    //=====================================================================================
    // Pass 2: replace
    //=====================================================================================

    fn replace(&self, value: &Value) -> Value {
        match value {
            Value::Object(object) => {
                let mut out = Map::with_capacity(object.len());
                for (key, nested) in object {
                    out.insert(key.clone(), self.replace_field(key, nested));
                }
                if out.contains_key("studentEmail") && out.contains_key("studentName") {
                    complete_submission(&mut out);
                }
                Value::Object(out)
            }
            Value::Array(items) => Value::Array(items.iter().map(|i| self.replace(i)).collect()),
            other => other.clone(),
        }
    }

    fn replace_field(&self, key: &str, value: &Value) -> Value {
        let Some(text) = value.as_str() else {
            return match (key, value) {
                ("quizData", Value::Object(_)) => {
                    let mut quiz = self.replace(value);
                    if let Value::Object(fields) = &mut quiz {
                        complete_quiz(fields);
                    }
                    quiz
                }
                _ => self.replace(value),
            };
        };

        match key {
            "email" | "teacherEmail" if self.is_teacher_email(text) => {
                Value::String(self.options.replacement_teacher_email.clone())
            }
            "email" | "studentEmail" => match self.student_number(text) {
                Some(number) => {
                    let reversed = self
                        .student_numbers
                        .get(&number)
                        .cloned()
                        .unwrap_or_else(|| number.chars().rev().collect());
                    Value::String(format!("{}@{}", reversed, self.options.student_domain))
                }
                None => value.clone(),
            },
            "name" | "displayName" | "studentName" => self
                .names
                .get(text)
                .map(|fake| Value::String(fake.clone()))
                .unwrap_or_else(|| value.clone()),
            "studentId" => self
                .student_ids
                .get(text)
                .map(|fake| Value::String(fake.clone()))
                .unwrap_or_else(|| value.clone()),
            "courseGroupEmail" => Value::String(text.replace(
                &format!("@{}", self.options.student_domain),
                "@example.com",
            )),
            _ if URL_FIELDS.contains(&key) => placeholder_url(text)
                .map(|url| Value::String(url.to_string()))
                .unwrap_or_else(|| value.clone()),
            _ => value.clone(),
        }
    }

    fn is_teacher_email(&self, email: &str) -> bool {
        self.options
            .teacher_email
            .as_deref()
            .is_some_and(|teacher| teacher.eq_ignore_ascii_case(email))
    }
}

fn fake_student_id(counter: usize, width: usize) -> String {
    format!("{:0>width$}", counter, width = width.max(1))
}

fn placeholder_url(url: &str) -> Option<&'static str> {
    if url.contains("classroom.google.com") {
        Some("https://classroom.example.com/placeholder")
    } else if url.contains("docs.google.com/forms") {
        Some("https://forms.example.com/placeholder")
    } else if url.contains("docs.google.com/spreadsheets") {
        Some("https://sheets.example.com/placeholder")
    } else if url.contains("googleusercontent.com") || url.starts_with("//lh") {
        Some("https://cdn.example.com/placeholder.png")
    } else {
        None
    }
}

/// Fills in the fields fixtures expect every quiz to carry.
fn complete_quiz(quiz: &mut Map<String, Value>) {
    let question_count = quiz
        .get("questions")
        .and_then(Value::as_array)
        .map_or(0, Vec::len);

    let defaults = [
        ("formId", json!(format!("quiz_form_{:06}", question_count))),
        ("formUrl", json!("https://forms.example.com/placeholder")),
        ("title", json!("Sample Quiz")),
        ("isQuiz", json!(true)),
        ("collectEmailAddresses", json!(true)),
        ("allowResponseEditing", json!(false)),
        ("totalQuestions", json!(question_count)),
        ("totalPoints", json!(100)),
        ("autoGradableQuestions", json!(0)),
        ("manualGradingRequired", json!(true)),
        ("requireSignIn", json!(true)),
    ];
    for (key, default) in defaults {
        quiz.entry(key).or_insert(default);
    }
}

fn complete_submission(submission: &mut Map<String, Value>) {
    if !submission.contains_key("updatedAt") {
        let updated_at = submission
            .get("submittedAt")
            .cloned()
            .unwrap_or_else(|| json!(FALLBACK_UPDATED_AT));
        submission.insert("updatedAt".to_string(), updated_at);
    }
    submission
        .entry("attachments")
        .or_insert_with(|| Value::Array(Vec::new()));

    if let Some(Value::Object(grade)) = submission.get_mut("grade") {
        if grade.get("gradedBy").and_then(Value::as_str) == Some("teacher") {
            grade.insert("gradedBy".to_string(), json!("manual"));
        }
    }
}
