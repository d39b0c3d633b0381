//! `SeaORM` entity definitions.

pub mod file_metadata;

pub mod prelude {
    //! Entity re-exports.

    pub use super::file_metadata::Entity as FileMetadata;
}
