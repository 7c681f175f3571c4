//! Persistence module split across logical submodules.

mod connection;
mod students;

pub use connection::{ensure_schema, open_in_memory, open_store};
pub use students::{
    count_students, create_student, delete_student, fetch_all_students, fetch_student,
    find_students_by_name, update_student,
};
