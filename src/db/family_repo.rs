use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex};

use super::lock;
use super::store::{StoreError, StoreResult};
use crate::models::{Family, FamilyMember, MemberRole};

pub struct FamilyRepository {
    conn: Arc<Mutex<Connection>>,
}

impl FamilyRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    pub fn upsert(&self, family: &Family) -> StoreResult<()> {
        let conn = lock(&self.conn)?;
        conn.execute(
            "INSERT INTO families (family_id, tree_id, husband_id, wife_id,
                                   marriage_date, marriage_year, marriage_place)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(family_id, tree_id) DO UPDATE SET
                husband_id = excluded.husband_id,
                wife_id = excluded.wife_id,
                marriage_date = excluded.marriage_date,
                marriage_year = excluded.marriage_year,
                marriage_place = excluded.marriage_place,
                imported_at = datetime('now')",
            params![
                family.family_id,
                family.tree_id,
                family.husband_id,
                family.wife_id,
                family.marriage_date,
                family.marriage_year,
                family.marriage_place,
            ],
        )?;
        Ok(())
    }

    pub fn find(&self, family_id: &str, tree_id: &str) -> StoreResult<Option<Family>> {
        let conn = lock(&self.conn)?;
        let family = conn
            .query_row(
                "SELECT family_id, tree_id, husband_id, wife_id, marriage_date,
                        marriage_year, marriage_place, imported_at
                 FROM families WHERE family_id = ?1 AND tree_id = ?2",
                params![family_id, tree_id],
                Self::row_to_family,
            )
            .optional()?;
        Ok(family)
    }

    pub fn ids(&self, tree_id: &str) -> StoreResult<Vec<String>> {
        let conn = lock(&self.conn)?;
        let mut stmt = conn.prepare("SELECT family_id FROM families WHERE tree_id = ?")?;
        let ids = stmt
            .query_map([tree_id], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(ids)
    }

    pub fn count(&self, tree_id: &str) -> StoreResult<i64> {
        let conn = lock(&self.conn)?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM families WHERE tree_id = ?",
            [tree_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Sätt makar efter att referenserna lösts upp
    pub fn set_spouses(
        &self,
        family_id: &str,
        tree_id: &str,
        husband_id: Option<&str>,
        wife_id: Option<&str>,
    ) -> StoreResult<()> {
        let conn = lock(&self.conn)?;
        conn.execute(
            "UPDATE families SET husband_id = ?3, wife_id = ?4
             WHERE family_id = ?1 AND tree_id = ?2",
            params![family_id, tree_id, husband_id, wife_id],
        )?;
        Ok(())
    }

    pub fn members(&self, family_id: &str, tree_id: &str) -> StoreResult<Vec<FamilyMember>> {
        let conn = lock(&self.conn)?;
        let mut stmt = conn.prepare(
            "SELECT family_id, tree_id, person_id, role, pedigree, sort_order
             FROM family_members
             WHERE family_id = ?1 AND tree_id = ?2
             ORDER BY CASE role WHEN 'husband' THEN 0 WHEN 'wife' THEN 1 ELSE 2 END, sort_order",
        )?;

        let rows = stmt
            .query_map(params![family_id, tree_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, Option<String>>(4)?,
                    row.get::<_, i32>(5)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter()
            .map(|(family_id, tree_id, person_id, role, pedigree, sort_order)| {
                let role = MemberRole::from_db_str(&role)
                    .ok_or_else(|| StoreError::Record(format!("Okänd familjeroll: {}", role)))?;
                Ok(FamilyMember {
                    family_id,
                    tree_id,
                    person_id,
                    role,
                    pedigree,
                    sort_order,
                })
            })
            .collect()
    }

    pub fn clear_members(&self, family_id: &str, tree_id: &str) -> StoreResult<()> {
        let conn = lock(&self.conn)?;
        conn.execute(
            "DELETE FROM family_members WHERE family_id = ?1 AND tree_id = ?2",
            params![family_id, tree_id],
        )?;
        Ok(())
    }

    pub fn add_member(&self, member: &FamilyMember) -> StoreResult<()> {
        let conn = lock(&self.conn)?;
        conn.execute(
            "INSERT INTO family_members (family_id, tree_id, person_id, role, pedigree, sort_order)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(family_id, tree_id, person_id, role) DO UPDATE SET
                pedigree = COALESCE(excluded.pedigree, family_members.pedigree),
                sort_order = excluded.sort_order",
            params![
                member.family_id,
                member.tree_id,
                member.person_id,
                member.role.as_str(),
                member.pedigree,
                member.sort_order,
            ],
        )?;
        Ok(())
    }

    /// Familjer där personen är barn
    pub fn parent_families(&self, person_id: &str, tree_id: &str) -> StoreResult<Vec<String>> {
        let conn = lock(&self.conn)?;
        let mut stmt = conn.prepare(
            "SELECT family_id FROM family_members
             WHERE person_id = ?1 AND tree_id = ?2 AND role = 'child'
             ORDER BY family_id",
        )?;
        let ids = stmt
            .query_map(params![person_id, tree_id], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(ids)
    }

    fn row_to_family(row: &Row) -> rusqlite::Result<Family> {
        Ok(Family {
            family_id: row.get(0)?,
            tree_id: row.get(1)?,
            husband_id: row.get(2)?,
            wife_id: row.get(3)?,
            marriage_date: row.get(4)?,
            marriage_year: row.get(5)?,
            marriage_place: row.get(6)?,
            imported_at: row.get(7)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    fn member(person_id: &str, role: MemberRole, sort_order: i32) -> FamilyMember {
        FamilyMember {
            family_id: "F1".into(),
            tree_id: "t1".into(),
            person_id: person_id.into(),
            role,
            pedigree: None,
            sort_order,
        }
    }

    #[test]
    fn test_members_are_unique_per_role() {
        let db = Database::open_in_memory().unwrap();
        let repo = db.families();
        repo.upsert(&Family::new("F1", "t1")).unwrap();

        repo.add_member(&member("I3", MemberRole::Child, 1)).unwrap();
        repo.add_member(&member("I1", MemberRole::Husband, 0)).unwrap();
        repo.add_member(&member("I3", MemberRole::Child, 1)).unwrap();

        let members = repo.members("F1", "t1").unwrap();
        assert_eq!(members.len(), 2);
        assert_eq!(members[0].role, MemberRole::Husband);
        assert_eq!(repo.parent_families("I3", "t1").unwrap(), vec!["F1".to_string()]);

        repo.clear_members("F1", "t1").unwrap();
        assert!(repo.members("F1", "t1").unwrap().is_empty());
    }

    #[test]
    fn test_set_spouses() {
        let db = Database::open_in_memory().unwrap();
        let repo = db.families();
        repo.upsert(&Family::new("F1", "t1")).unwrap();
        repo.set_spouses("F1", "t1", Some("I1"), None).unwrap();

        let family = repo.find("F1", "t1").unwrap().unwrap();
        assert_eq!(family.husband_id.as_deref(), Some("I1"));
        assert!(family.wife_id.is_none());
    }
}
