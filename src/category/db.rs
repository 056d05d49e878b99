//! Database operations for categories and subcategories.

use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{
    Error, UserID, database_id::DatabaseId, name::Name, text_enum::text_enum,
};

/// Database identifier for a category.
pub type CategoryId = DatabaseId;

/// Database identifier for a subcategory.
pub type SubcategoryId = DatabaseId;

text_enum! {
    /// Whether a category groups money going out or coming in.
    pub enum CategoryKind {
        /// Money spent, e.g. "Groceries".
        Expense => "expense",
        /// Money earned, e.g. "Wages".
        Income => "income",
    }
}

/// A user defined label for expenses or income, e.g. 'Groceries', 'Wages'.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    /// The ID of the category.
    pub id: CategoryId,
    /// The user who owns the category.
    pub user_id: UserID,
    /// The name of the category, unique among the user's categories.
    pub name: Name,
    /// Whether the category is for expenses or income.
    pub kind: CategoryKind,
}

/// A finer grained label within a category, e.g. 'Coffee' in 'Eating Out'.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subcategory {
    /// The ID of the subcategory.
    pub id: SubcategoryId,
    /// The category the subcategory belongs to.
    pub category_id: CategoryId,
    /// The name of the subcategory, unique within its category.
    pub name: Name,
}

/// Initialize the category and subcategory tables and indexes.
pub fn create_category_tables(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS category (
            id INTEGER PRIMARY KEY,
            user_id INTEGER NOT NULL,
            name TEXT NOT NULL COLLATE NOCASE,
            kind TEXT NOT NULL,
            deleted_at TEXT,
            FOREIGN KEY(user_id) REFERENCES user(id) ON DELETE CASCADE
        );

        CREATE UNIQUE INDEX IF NOT EXISTS idx_category_user_name
        ON category(user_id, name) WHERE deleted_at IS NULL;

        CREATE TABLE IF NOT EXISTS subcategory (
            id INTEGER PRIMARY KEY,
            category_id INTEGER NOT NULL,
            name TEXT NOT NULL COLLATE NOCASE,
            deleted_at TEXT,
            FOREIGN KEY(category_id) REFERENCES category(id) ON DELETE CASCADE
        );

        CREATE UNIQUE INDEX IF NOT EXISTS idx_subcategory_category_name
        ON subcategory(category_id, name) WHERE deleted_at IS NULL;",
    )?;

    Ok(())
}

fn map_duplicate_name(error: rusqlite::Error, entity: &'static str, name: &Name) -> Error {
    match error {
        rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error {
                code: _,
                extended_code: rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE,
            },
            _,
        ) => Error::DuplicateName(entity, name.to_string()),
        error => error.into(),
    }
}

/// Create a category and return it with its generated ID.
///
/// # Errors
///
/// Returns an [Error::EmptyName] if `name` is blank or an
/// [Error::DuplicateName] if the user has a live category with the same name.
pub fn create_category(
    user_id: UserID,
    name: &str,
    kind: CategoryKind,
    connection: &Connection,
) -> Result<Category, Error> {
    let name = Name::new(name, "category")?;

    connection
        .prepare(
            "INSERT INTO category (user_id, name, kind) VALUES (?1, ?2, ?3)
             RETURNING id, user_id, name, kind",
        )?
        .query_row((user_id.as_i64(), name.as_ref(), kind), map_category_row)
        .map_err(|error| map_duplicate_name(error, "category", &name))
}

/// Retrieve the live category `id` owned by `user_id`.
///
/// # Errors
///
/// Returns an [Error::NotFound] if the category does not exist or was
/// deleted, or an [Error::Forbidden] if it belongs to another user.
pub fn get_category(
    id: CategoryId,
    user_id: UserID,
    connection: &Connection,
) -> Result<Category, Error> {
    let category = connection
        .prepare(
            "SELECT id, user_id, name, kind FROM category
             WHERE id = :id AND deleted_at IS NULL",
        )?
        .query_row(&[(":id", &id)], map_category_row)?;

    if category.user_id != user_id {
        return Err(Error::Forbidden(
            "you do not have access to this category".to_owned(),
        ));
    }

    Ok(category)
}

/// Retrieve the live categories of `user_id` ordered alphabetically by name,
/// optionally only those of one kind.
pub fn get_categories(
    user_id: UserID,
    kind: Option<CategoryKind>,
    connection: &Connection,
) -> Result<Vec<Category>, Error> {
    connection
        .prepare(
            "SELECT id, user_id, name, kind FROM category
             WHERE user_id = ?1 AND deleted_at IS NULL AND (?2 IS NULL OR kind = ?2)
             ORDER BY name ASC",
        )?
        .query_map((user_id.as_i64(), kind), map_category_row)?
        .map(|maybe_category| maybe_category.map_err(Error::from))
        .collect()
}

/// Rename category `id`.
///
/// The kind of a category cannot change since its transactions depend on it.
pub fn update_category(
    id: CategoryId,
    user_id: UserID,
    new_name: &str,
    connection: &Connection,
) -> Result<Category, Error> {
    let name = Name::new(new_name, "category")?;
    get_category(id, user_id, connection)?;

    connection
        .prepare(
            "UPDATE category SET name = ?1 WHERE id = ?2
             RETURNING id, user_id, name, kind",
        )?
        .query_row((name.as_ref(), id), map_category_row)
        .map_err(|error| map_duplicate_name(error, "category", &name))
}

/// Soft delete category `id` along with its subcategories.
///
/// Transactions keep their reference to the deleted category.
pub fn delete_category(id: CategoryId, user_id: UserID, connection: &Connection) -> Result<(), Error> {
    get_category(id, user_id, connection)?;
    let now = OffsetDateTime::now_utc();

    connection.execute(
        "UPDATE subcategory SET deleted_at = ?1 WHERE category_id = ?2 AND deleted_at IS NULL",
        (now, id),
    )?;
    connection.execute(
        "UPDATE category SET deleted_at = ?1 WHERE id = ?2",
        (now, id),
    )?;

    Ok(())
}

/// Create a subcategory in category `category_id`.
pub fn create_subcategory(
    category_id: CategoryId,
    user_id: UserID,
    name: &str,
    connection: &Connection,
) -> Result<Subcategory, Error> {
    let name = Name::new(name, "subcategory")?;
    get_category(category_id, user_id, connection)?;

    connection
        .prepare(
            "INSERT INTO subcategory (category_id, name) VALUES (?1, ?2)
             RETURNING id, category_id, name",
        )?
        .query_row((category_id, name.as_ref()), map_subcategory_row)
        .map_err(|error| map_duplicate_name(error, "subcategory", &name))
}

/// Retrieve the live subcategory `id` whose category is owned by `user_id`.
pub fn get_subcategory(
    id: SubcategoryId,
    user_id: UserID,
    connection: &Connection,
) -> Result<Subcategory, Error> {
    let (subcategory, owner_id) = connection
        .prepare(
            "SELECT subcategory.id, subcategory.category_id, subcategory.name, category.user_id
             FROM subcategory
             INNER JOIN category ON category.id = subcategory.category_id
             WHERE subcategory.id = :id AND subcategory.deleted_at IS NULL",
        )?
        .query_row(&[(":id", &id)], |row| {
            Ok((map_subcategory_row(row)?, UserID::new(row.get(3)?)))
        })?;

    if owner_id != user_id {
        return Err(Error::Forbidden(
            "you do not have access to this subcategory".to_owned(),
        ));
    }

    Ok(subcategory)
}

/// Retrieve the live subcategories of category `category_id` ordered by name.
pub fn get_subcategories(
    category_id: CategoryId,
    user_id: UserID,
    connection: &Connection,
) -> Result<Vec<Subcategory>, Error> {
    get_category(category_id, user_id, connection)?;

    connection
        .prepare(
            "SELECT id, category_id, name FROM subcategory
             WHERE category_id = :category_id AND deleted_at IS NULL
             ORDER BY name ASC",
        )?
        .query_map(&[(":category_id", &category_id)], map_subcategory_row)?
        .map(|maybe_subcategory| maybe_subcategory.map_err(Error::from))
        .collect()
}

/// Rename subcategory `id`.
pub fn update_subcategory(
    id: SubcategoryId,
    user_id: UserID,
    new_name: &str,
    connection: &Connection,
) -> Result<Subcategory, Error> {
    let name = Name::new(new_name, "subcategory")?;
    get_subcategory(id, user_id, connection)?;

    connection
        .prepare(
            "UPDATE subcategory SET name = ?1 WHERE id = ?2
             RETURNING id, category_id, name",
        )?
        .query_row((name.as_ref(), id), map_subcategory_row)
        .map_err(|error| map_duplicate_name(error, "subcategory", &name))
}

/// Soft delete subcategory `id`.
pub fn delete_subcategory(
    id: SubcategoryId,
    user_id: UserID,
    connection: &Connection,
) -> Result<(), Error> {
    get_subcategory(id, user_id, connection)?;

    connection.execute(
        "UPDATE subcategory SET deleted_at = ?1 WHERE id = ?2",
        (OffsetDateTime::now_utc(), id),
    )?;

    Ok(())
}

fn map_category_row(row: &Row) -> Result<Category, rusqlite::Error> {
    let raw_name: String = row.get(2)?;

    Ok(Category {
        id: row.get(0)?,
        user_id: UserID::new(row.get(1)?),
        name: Name::new_unchecked(&raw_name),
        kind: row.get(3)?,
    })
}

fn map_subcategory_row(row: &Row) -> Result<Subcategory, rusqlite::Error> {
    let raw_name: String = row.get(2)?;

    Ok(Subcategory {
        id: row.get(0)?,
        category_id: row.get(1)?,
        name: Name::new_unchecked(&raw_name),
    })
}

#[cfg(test)]
mod category_tests {
    use crate::{
        Error, UserID,
        category::db::{
            CategoryKind, create_category, delete_category, get_categories, get_category,
            update_category,
        },
        test_utils::{create_test_user, get_test_connection},
    };

    #[test]
    fn create_and_get_category() {
        let connection = get_test_connection();
        let user = create_test_user("ana@example.com", &connection);

        let category =
            create_category(user.id, " Groceries ", CategoryKind::Expense, &connection).unwrap();

        assert_eq!(category.name.as_ref(), "Groceries");
        assert_eq!(get_category(category.id, user.id, &connection), Ok(category));
    }

    #[test]
    fn create_rejects_blank_name() {
        let connection = get_test_connection();
        let user = create_test_user("ana@example.com", &connection);

        let result = create_category(user.id, "\t ", CategoryKind::Expense, &connection);

        assert_eq!(result, Err(Error::EmptyName("category")));
    }

    #[test]
    fn names_are_unique_per_user_ignoring_case() {
        let connection = get_test_connection();
        let ana = create_test_user("ana@example.com", &connection);
        let bob = create_test_user("bob@example.com", &connection);
        create_category(ana.id, "Rent", CategoryKind::Expense, &connection).unwrap();

        assert_eq!(
            create_category(ana.id, "rent", CategoryKind::Expense, &connection),
            Err(Error::DuplicateName("category", "rent".to_owned()))
        );
        assert!(create_category(bob.id, "Rent", CategoryKind::Expense, &connection).is_ok());
    }

    #[test]
    fn list_filters_by_kind() {
        let connection = get_test_connection();
        let user = create_test_user("ana@example.com", &connection);
        create_category(user.id, "Wages", CategoryKind::Income, &connection).unwrap();
        create_category(user.id, "Rent", CategoryKind::Expense, &connection).unwrap();

        let all = get_categories(user.id, None, &connection).unwrap();
        let income = get_categories(user.id, Some(CategoryKind::Income), &connection).unwrap();

        assert_eq!(all.len(), 2);
        assert_eq!(income.len(), 1);
        assert_eq!(income[0].name.as_ref(), "Wages");
    }

    #[test]
    fn update_renames_category() {
        let connection = get_test_connection();
        let user = create_test_user("ana@example.com", &connection);
        let category = create_category(user.id, "Food", CategoryKind::Expense, &connection).unwrap();

        let updated = update_category(category.id, user.id, "Groceries", &connection).unwrap();

        assert_eq!(updated.name.as_ref(), "Groceries");
        assert_eq!(updated.kind, CategoryKind::Expense);
    }

    #[test]
    fn other_users_category_is_forbidden() {
        let connection = get_test_connection();
        let ana = create_test_user("ana@example.com", &connection);
        let category = create_category(ana.id, "Food", CategoryKind::Expense, &connection).unwrap();

        let result = update_category(
            category.id,
            UserID::new(ana.id.as_i64() + 1),
            "Mine now",
            &connection,
        );

        assert!(matches!(result, Err(Error::Forbidden(_))));
    }

    #[test]
    fn deleted_category_is_hidden_and_name_reusable() {
        let connection = get_test_connection();
        let user = create_test_user("ana@example.com", &connection);
        let category = create_category(user.id, "Food", CategoryKind::Expense, &connection).unwrap();

        delete_category(category.id, user.id, &connection).unwrap();

        assert_eq!(get_category(category.id, user.id, &connection), Err(Error::NotFound));
        assert!(get_categories(user.id, None, &connection).unwrap().is_empty());
        assert!(create_category(user.id, "Food", CategoryKind::Expense, &connection).is_ok());
    }
}
