//! Search and category filtering with deterministic ordering.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::types::{Category, Task};

/// What the caller wants to see.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TaskQuery {
    /// Case-insensitive substring matched against title or description.
    /// Empty matches everything.
    pub search_text: String,
    /// Only tasks in this category, when set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
}

impl TaskQuery {
    /// Query with both criteria.
    pub fn new(search_text: impl Into<String>, category: Option<Category>) -> Self {
        Self {
            search_text: search_text.into(),
            category,
        }
    }

    /// Whether `task` satisfies every criterion.
    pub fn matches(&self, task: &Task) -> bool {
        self.category_matches(task) && self.text_matches(task)
    }

    fn category_matches(&self, task: &Task) -> bool {
        self.category.is_none_or(|c| c == task.category)
    }

    fn text_matches(&self, task: &Task) -> bool {
        if self.search_text.is_empty() {
            return true;
        }
        let needle = self.search_text.to_lowercase();
        task.title.to_lowercase().contains(&needle)
            || task.description.to_lowercase().contains(&needle)
    }
}

/// Tasks matching `query`, sorted by [`compare_tasks`]. Inputs are cloned,
/// never modified.
pub fn filter<'a, I>(tasks: I, query: &TaskQuery) -> Vec<Task>
where
    I: IntoIterator<Item = &'a Task>,
{
    let mut out: Vec<Task> = tasks
        .into_iter()
        .filter(|t| query.matches(t))
        .cloned()
        .collect();
    out.sort_by(compare_tasks);
    out
}

/// Display order: earliest due date first, undated tasks last, then by
/// creation time, then by ID.
pub fn compare_tasks(a: &Task, b: &Task) -> Ordering {
    let by_due = match (a.due_date, b.due_date) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };
    by_due
        .then_with(|| a.created_at.cmp(&b.created_at))
        .then_with(|| a.id.cmp(&b.id))
}

#[cfg(test)]
#[allow(unused_results)]
mod tests {
    use super::*;
    use crate::types::{TaskPriority, TaskStatus};
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use docket_core::TaskId;

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 4, 1, 9, 0, 0).unwrap()
    }

    fn task(id: &str, title: &str, description: &str, category: Category) -> Task {
        Task {
            id: TaskId::from(id),
            title: title.into(),
            description: description.into(),
            created_at: base(),
            due_date: None,
            priority: TaskPriority::Medium,
            status: TaskStatus::Pending,
            category,
            location: None,
            schedule_time_enabled: false,
        }
    }

    fn ids(tasks: &[Task]) -> Vec<&str> {
        tasks.iter().map(|t| t.id.as_str()).collect()
    }

    #[test]
    fn empty_query_returns_everything() {
        let tasks = vec![
            task("a", "Buy milk", "", Category::Shopping),
            task("b", "Report", "", Category::Work),
        ];
        assert_eq!(filter(&tasks, &TaskQuery::default()).len(), 2);
    }

    #[test]
    fn search_matches_title_or_description_case_insensitive() {
        let tasks = vec![
            task("a", "Buy MILK", "", Category::Shopping),
            task("b", "Groceries", "milk and eggs", Category::Shopping),
            task("c", "Report", "quarterly", Category::Work),
        ];
        let out = filter(&tasks, &TaskQuery::new("milk", None));
        assert_eq!(ids(&out), vec!["a", "b"]);
    }

    #[test]
    fn category_only() {
        let tasks = vec![
            task("a", "Buy milk", "", Category::Shopping),
            task("b", "Report", "", Category::Work),
        ];
        let out = filter(&tasks, &TaskQuery::new("", Some(Category::Work)));
        assert_eq!(ids(&out), vec!["b"]);
    }

    #[test]
    fn criteria_are_conjunctive() {
        let tasks = vec![
            task("a", "Buy milk", "", Category::Shopping),
            task("b", "Milk report", "", Category::Work),
            task("c", "Laundry", "", Category::Personal),
        ];
        let out = filter(&tasks, &TaskQuery::new("milk", Some(Category::Work)));
        assert_eq!(ids(&out), vec!["b"]);
    }

    #[test]
    fn dated_before_undated_then_created_then_id() {
        let mut late = task("late", "x", "", Category::Work);
        late.due_date = Some(base() + Duration::days(2));
        let mut early = task("early", "x", "", Category::Work);
        early.due_date = Some(base() + Duration::days(1));
        let mut undated_old = task("undated-old", "x", "", Category::Work);
        undated_old.created_at = base() - Duration::days(1);
        let undated_b = task("undated-b", "x", "", Category::Work);
        let undated_a = task("undated-a", "x", "", Category::Work);

        let tasks = vec![undated_b, late, undated_a, undated_old, early];
        let out = filter(&tasks, &TaskQuery::default());
        assert_eq!(
            ids(&out),
            vec!["early", "late", "undated-old", "undated-a", "undated-b"]
        );
    }

    #[test]
    fn input_not_mutated() {
        let tasks = vec![
            task("b", "x", "", Category::Work),
            task("a", "x", "", Category::Work),
        ];
        let before = tasks.clone();
        let _ = filter(&tasks, &TaskQuery::default());
        assert_eq!(tasks, before);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        fn any_category() -> impl Strategy<Value = Category> {
            prop::sample::select(Category::ALL.to_vec())
        }

        fn any_task() -> impl Strategy<Value = Task> {
            (
                "[a-z]{1,6}",
                "[a-zA-Z ]{0,12}",
                "[a-zA-Z ]{0,12}",
                any_category(),
                prop::option::of(-1000i64..1000),
            )
                .prop_map(|(id, title, desc, cat, due)| {
                    let mut t = task(&id, &title, &desc, cat);
                    t.due_date = due.map(|m| base() + Duration::minutes(m));
                    t
                })
        }

        proptest! {
            #[test]
            fn filter_is_intersection_of_criteria(
                tasks in prop::collection::vec(any_task(), 0..20),
                text in "[a-z]{0,3}",
                cat in prop::option::of(any_category()),
            ) {
                let both = filter(&tasks, &TaskQuery::new(text.clone(), cat));
                let text_only = filter(&tasks, &TaskQuery::new(text, None));
                let cat_only = filter(&tasks, &TaskQuery::new("", cat));

                for t in &both {
                    prop_assert!(text_only.contains(t));
                    prop_assert!(cat_only.contains(t));
                }
                let expected = text_only.iter().filter(|t| cat_only.contains(t)).count();
                prop_assert_eq!(both.len(), expected);
            }

            #[test]
            fn output_is_sorted(tasks in prop::collection::vec(any_task(), 0..20)) {
                let out = filter(&tasks, &TaskQuery::default());
                for pair in out.windows(2) {
                    prop_assert_ne!(compare_tasks(&pair[0], &pair[1]), Ordering::Greater);
                }
                let dated = out.iter().take_while(|t| t.due_date.is_some()).count();
                prop_assert!(out[dated..].iter().all(|t| t.due_date.is_none()));
            }
        }
    }
}
