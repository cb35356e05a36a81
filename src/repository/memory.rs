use async_trait::async_trait;
use std::{cmp::Reverse, collections::HashMap};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{RepoError, RepoResult, Repository};
use crate::models::{Comment, Employee, Marker, Publication, User, UserStatus};

/// MemoryRepository
///
/// Process-local store behind tokio `RwLock`s. Backs the test-suite and local runs
/// without `DATABASE_URL`. Publications and markers are kept in insertion order so
/// that equal timestamps still sort newest-inserted first.
#[derive(Default)]
pub struct MemoryRepository {
    users: RwLock<HashMap<Uuid, User>>,
    employees: RwLock<HashMap<Uuid, Employee>>,
    publications: RwLock<Vec<Publication>>,
    markers: RwLock<Vec<Marker>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Newest first; among equal timestamps the later insert wins.
fn newest_first<T: Clone>(items: &[T], created_at: impl Fn(&T) -> chrono::DateTime<chrono::Utc>) -> Vec<T> {
    let mut out: Vec<T> = items.iter().rev().cloned().collect();
    out.sort_by_key(|item| Reverse(created_at(item)));
    out
}

#[async_trait]
impl Repository for MemoryRepository {
    // --- USERS ---

    async fn create_user(&self, user: &User) -> RepoResult<()> {
        let mut users = self.users.write().await;
        if users.values().any(|u| u.email == user.email) {
            return Err(RepoError::Duplicate("Email".into()));
        }
        users.insert(user.id, user.clone());
        Ok(())
    }

    async fn get_user(&self, id: Uuid) -> RepoResult<Option<User>> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn get_users(&self, ids: &[Uuid]) -> RepoResult<Vec<User>> {
        let users = self.users.read().await;
        Ok(ids.iter().filter_map(|id| users.get(id).cloned()).collect())
    }

    async fn list_users(&self) -> RepoResult<Vec<User>> {
        let users: Vec<User> = self.users.read().await.values().cloned().collect();
        Ok(newest_first(&users, |u| u.created_at))
    }

    async fn list_notification_recipients(&self, operator_emails: &[String]) -> RepoResult<Vec<User>> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .filter(|u| {
                u.status == UserStatus::Admin || operator_emails.contains(&u.email.to_lowercase())
            })
            .cloned()
            .collect())
    }

    async fn save_user(&self, user: &User) -> RepoResult<()> {
        let mut users = self.users.write().await;
        if users.values().any(|u| u.id != user.id && u.email == user.email) {
            return Err(RepoError::Duplicate("Email".into()));
        }
        if let Some(slot) = users.get_mut(&user.id) {
            *slot = user.clone();
        }
        Ok(())
    }

    async fn delete_user(&self, id: Uuid) -> RepoResult<bool> {
        Ok(self.users.write().await.remove(&id).is_some())
    }

    // --- PUBLICATIONS ---

    async fn insert_publication(&self, publication: &Publication) -> RepoResult<()> {
        self.publications.write().await.push(publication.clone());
        Ok(())
    }

    async fn get_publication(&self, id: Uuid) -> RepoResult<Option<Publication>> {
        Ok(self
            .publications
            .read()
            .await
            .iter()
            .find(|p| p.id == id)
            .cloned())
    }

    async fn save_publication(&self, publication: &Publication) -> RepoResult<()> {
        let mut publications = self.publications.write().await;
        if let Some(slot) = publications.iter_mut().find(|p| p.id == publication.id) {
            let likes = std::mem::take(&mut slot.likes);
            let comments = std::mem::take(&mut slot.comments);
            *slot = Publication {
                likes,
                comments,
                ..publication.clone()
            };
        }
        Ok(())
    }

    async fn toggle_like(&self, id: Uuid, user_id: Uuid) -> RepoResult<Option<Publication>> {
        let mut publications = self.publications.write().await;
        Ok(publications
            .iter_mut()
            .find(|p| p.id == id && p.is_active)
            .map(|p| {
                p.toggle_like(user_id);
                p.clone()
            }))
    }

    async fn append_comment(&self, id: Uuid, comment: &Comment) -> RepoResult<Option<Publication>> {
        let mut publications = self.publications.write().await;
        Ok(publications
            .iter_mut()
            .find(|p| p.id == id && p.is_active)
            .map(|p| {
                p.comments.push(comment.clone());
                p.clone()
            }))
    }

    async fn list_active_publications(&self, offset: u64, limit: u64) -> RepoResult<Vec<Publication>> {
        let active: Vec<Publication> = self
            .publications
            .read()
            .await
            .iter()
            .filter(|p| p.is_active)
            .cloned()
            .collect();

        Ok(newest_first(&active, |p| p.created_at)
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }

    async fn count_active_publications(&self) -> RepoResult<u64> {
        Ok(self
            .publications
            .read()
            .await
            .iter()
            .filter(|p| p.is_active)
            .count() as u64)
    }

    async fn list_user_publications(&self, user_id: Uuid) -> RepoResult<Vec<Publication>> {
        let owned: Vec<Publication> = self
            .publications
            .read()
            .await
            .iter()
            .filter(|p| p.is_active && p.user_id == user_id)
            .cloned()
            .collect();
        Ok(newest_first(&owned, |p| p.created_at))
    }

    // --- MARKERS ---

    async fn insert_marker(&self, marker: &Marker) -> RepoResult<()> {
        self.markers.write().await.push(marker.clone());
        Ok(())
    }

    async fn get_marker(&self, id: Uuid) -> RepoResult<Option<Marker>> {
        Ok(self.markers.read().await.iter().find(|m| m.id == id).cloned())
    }

    async fn save_marker(&self, marker: &Marker) -> RepoResult<()> {
        let mut markers = self.markers.write().await;
        if let Some(slot) = markers.iter_mut().find(|m| m.id == marker.id) {
            *slot = marker.clone();
        }
        Ok(())
    }

    async fn delete_marker(&self, id: Uuid) -> RepoResult<bool> {
        let mut markers = self.markers.write().await;
        let before = markers.len();
        markers.retain(|m| m.id != id);
        Ok(markers.len() < before)
    }

    async fn list_markers(&self) -> RepoResult<Vec<Marker>> {
        let markers = self.markers.read().await;
        Ok(newest_first(markers.as_slice(), |m| m.created_at))
    }

    async fn list_user_markers(&self, user_id: Uuid) -> RepoResult<Vec<Marker>> {
        let owned: Vec<Marker> = self
            .markers
            .read()
            .await
            .iter()
            .filter(|m| m.user_id == user_id)
            .cloned()
            .collect();
        Ok(newest_first(&owned, |m| m.created_at))
    }

    // --- EMPLOYEES ---

    async fn insert_employee(&self, employee: &Employee) -> RepoResult<()> {
        let mut employees = self.employees.write().await;
        if employees.values().any(|e| e.email == employee.email) {
            return Err(RepoError::Duplicate("Email".into()));
        }
        employees.insert(employee.id, employee.clone());
        Ok(())
    }

    async fn get_employee(&self, id: Uuid) -> RepoResult<Option<Employee>> {
        Ok(self.employees.read().await.get(&id).cloned())
    }

    async fn find_employee_by_email(&self, email: &str) -> RepoResult<Option<Employee>> {
        Ok(self
            .employees
            .read()
            .await
            .values()
            .find(|e| e.email == email)
            .cloned())
    }

    async fn save_employee(&self, employee: &Employee) -> RepoResult<()> {
        let mut employees = self.employees.write().await;
        if employees
            .values()
            .any(|e| e.id != employee.id && e.email == employee.email)
        {
            return Err(RepoError::Duplicate("Email".into()));
        }
        if let Some(slot) = employees.get_mut(&employee.id) {
            *slot = employee.clone();
        }
        Ok(())
    }

    async fn delete_employee(&self, id: Uuid) -> RepoResult<bool> {
        Ok(self.employees.write().await.remove(&id).is_some())
    }

    async fn list_employees(&self) -> RepoResult<Vec<Employee>> {
        let employees: Vec<Employee> = self.employees.read().await.values().cloned().collect();
        Ok(newest_first(&employees, |e| e.created_at))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    #[tokio::test]
    async fn duplicate_emails_are_refused() {
        let repo = MemoryRepository::new();
        repo.create_user(&User::new("a@example.com", "h")).await.unwrap();
        let err = repo
            .create_user(&User::new("a@example.com", "h"))
            .await
            .unwrap_err();
        assert!(matches!(err, RepoError::Duplicate(_)));
    }

    #[tokio::test]
    async fn feed_is_paged_newest_first_and_skips_inactive() {
        let repo = MemoryRepository::new();
        let owner = Uuid::new_v4();
        let base = Utc::now();

        for i in 0..5 {
            let mut p = Publication::new(owner, format!("post {i}"));
            p.created_at = base + Duration::seconds(i);
            p.is_active = i != 2;
            repo.insert_publication(&p).await.unwrap();
        }

        assert_eq!(repo.count_active_publications().await.unwrap(), 4);
        let page: Vec<String> = repo
            .list_active_publications(1, 2)
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.content)
            .collect();
        assert_eq!(page, vec!["post 3", "post 1"]);
    }

    #[tokio::test]
    async fn likes_and_comments_survive_a_stale_save() {
        let repo = MemoryRepository::new();
        let publication = Publication::new(Uuid::new_v4(), "hello");
        repo.insert_publication(&publication).await.unwrap();

        let mut stale = repo.get_publication(publication.id).await.unwrap().unwrap();
        let liker = Uuid::new_v4();
        repo.toggle_like(publication.id, liker).await.unwrap();
        repo.append_comment(publication.id, &Comment::new(liker, "nice"))
            .await
            .unwrap();

        stale.content = "edited".into();
        repo.save_publication(&stale).await.unwrap();

        let stored = repo.get_publication(publication.id).await.unwrap().unwrap();
        assert_eq!(stored.content, "edited");
        assert_eq!(stored.likes, vec![liker]);
        assert_eq!(stored.comments.len(), 1);
    }

    #[tokio::test]
    async fn like_and_comment_skip_inactive_publications() {
        let repo = MemoryRepository::new();
        let mut publication = Publication::new(Uuid::new_v4(), "gone");
        publication.is_active = false;
        repo.insert_publication(&publication).await.unwrap();

        let user = Uuid::new_v4();
        assert!(repo.toggle_like(publication.id, user).await.unwrap().is_none());
        assert!(repo
            .append_comment(publication.id, &Comment::new(user, "hi"))
            .await
            .unwrap()
            .is_none());
    }
}
