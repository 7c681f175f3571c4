use crate::models::Student;

/// Display cache behind the main table. It is rebuilt from the store after
/// every mutation and never written back.
pub(crate) struct StudentTable {
    pub(crate) students: Vec<Student>,
    pub(crate) filtered: Vec<Student>,
    pub(crate) filter: Option<String>,
    pub(crate) selected: usize,
}

impl StudentTable {
    pub(crate) fn new(students: Vec<Student>) -> Self {
        let mut table = Self {
            filtered: Vec::new(),
            students,
            filter: None,
            selected: 0,
        };
        table.apply_filter();
        table
    }

    pub(crate) fn apply_filter(&mut self) {
        self.filtered = match self.active_filter() {
            Some(query) => self
                .students
                .iter()
                .filter(|student| student.name_matches(query))
                .cloned()
                .collect(),
            None => self.students.clone(),
        };
        self.ensure_in_bounds();
    }

    /// The current query when it is non-blank.
    pub(crate) fn active_filter(&self) -> Option<&str> {
        self.filter
            .as_deref()
            .filter(|query| !query.trim().is_empty())
    }

    pub(crate) fn set_filter(&mut self, filter: Option<String>) {
        self.filter = filter;
        self.apply_filter();
    }

    /// Swap in freshly loaded rows, keeping the current filter.
    pub(crate) fn set_students(&mut self, students: Vec<Student>) {
        self.students = students;
        self.apply_filter();
    }

    pub(crate) fn current_student(&self) -> Option<&Student> {
        self.filtered.get(self.selected)
    }

    /// Move the selection onto `id` if it is visible. Returns whether it was.
    pub(crate) fn select_id(&mut self, id: i64) -> bool {
        match self.filtered.iter().position(|student| student.id == id) {
            Some(index) => {
                self.selected = index;
                true
            }
            None => false,
        }
    }

    pub(crate) fn move_selection(&mut self, offset: isize) {
        if self.filtered.is_empty() {
            return;
        }
        let last = self.filtered.len() as isize - 1;
        self.selected = (self.selected as isize + offset).clamp(0, last) as usize;
    }

    pub(crate) fn select_first(&mut self) {
        self.selected = 0;
    }

    pub(crate) fn select_last(&mut self) {
        self.selected = self.filtered.len().saturating_sub(1);
    }

    /// Mean score over every stored student, ignoring the filter.
    pub(crate) fn average_score(&self) -> Option<f64> {
        if self.students.is_empty() {
            return None;
        }
        let total: f64 = self.students.iter().map(|student| student.score).sum();
        Some(total / self.students.len() as f64)
    }

    fn ensure_in_bounds(&mut self) {
        if self.filtered.is_empty() {
            self.selected = 0;
        } else if self.selected >= self.filtered.len() {
            self.selected = self.filtered.len() - 1;
        }
    }
}
