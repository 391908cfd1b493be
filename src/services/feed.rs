//! Social feed: posts, comments, likes, shares, service listings, polls.
//! Shallow CRUD next to the messaging core; like toggles follow the same
//! toggle shape as message reactions.

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;

use crate::authz::{self, PrivilegeLevel};
use crate::errors::{AppError, AppResult};
use crate::models::{
    Comment, CreateCommentRequest, CreatePollRequest, CreatePostRequest, CreateServiceRequest,
    Poll, PollOption, Post, PostView, ServiceListing, UserProfile,
};
use crate::store::{from_doc, to_doc, Collection, DocumentStore, Filter, Sort};

use super::{fetch_group, new_id};

const FEED_PAGE_SIZE: usize = 50;

#[derive(Clone)]
pub struct Feed {
    store: Arc<dyn DocumentStore>,
    admin_email: String,
}

impl Feed {
    pub fn new(store: Arc<dyn DocumentStore>, admin_email: String) -> Self {
        Self { store, admin_email }
    }

    // ─── Posts ─────────────────────────────────────────

    pub async fn create_post(&self, actor: &UserProfile, req: CreatePostRequest) -> AppResult<Post> {
        let content = req.content.trim().to_string();
        if content.is_empty() && req.image_url.is_none() {
            return Err(AppError::Validation("Post content cannot be empty".into()));
        }
        let post = Post {
            id: new_id(),
            user_id: actor.uid.clone(),
            user_name: actor.display_name(),
            user_profile_image: actor.profile_image_url.clone(),
            content,
            image_url: req.image_url,
            likes: vec![],
            shares: 0,
            timestamp: Utc::now(),
        };
        self.store.insert(Collection::Posts, to_doc(&post)?).await?;
        Ok(post)
    }

    pub async fn list_posts(&self, viewer: &UserProfile) -> AppResult<Vec<PostView>> {
        let docs = self
            .store
            .find_many(
                Collection::Posts,
                &Filter::All,
                Some(&Sort::desc("timestamp")),
                Some(FEED_PAGE_SIZE),
            )
            .await?;
        let mut views = Vec::with_capacity(docs.len());
        for doc in docs {
            let post: Post = from_doc(doc)?;
            let comment_count = self
                .store
                .count(Collection::Comments, &Filter::field("postId", post.id.as_str()))
                .await?;
            views.push(PostView {
                is_liked: post.likes.iter().any(|u| u == &viewer.uid),
                like_count: post.likes.len(),
                comment_count,
                post,
            });
        }
        Ok(views)
    }

    /// Toggle the viewer's like. Returns the resulting like count.
    pub async fn like_post(&self, actor: &UserProfile, post_id: &str) -> AppResult<usize> {
        let post = self.fetch_post(post_id).await?;
        if post.likes.iter().any(|u| u == &actor.uid) {
            self.store
                .pull(Collection::Posts, &Filter::id(post_id), "likes", json!(actor.uid))
                .await?;
            Ok(post.likes.len() - 1)
        } else {
            self.store
                .add_to_set(Collection::Posts, &Filter::id(post_id), "likes", json!(actor.uid))
                .await?;
            Ok(post.likes.len() + 1)
        }
    }

    /// Bump the share counter.
    pub async fn share_post(&self, post_id: &str) -> AppResult<i64> {
        let post = self.fetch_post(post_id).await?;
        let shares = post.shares + 1;
        self.store
            .set_fields(Collection::Posts, &Filter::id(post_id), json!({"shares": shares}))
            .await?;
        Ok(shares)
    }

    pub async fn delete_post(&self, actor: &UserProfile, post_id: &str) -> AppResult<()> {
        let post = self.fetch_post(post_id).await?;
        if post.user_id != actor.uid && !authz::is_global_admin(actor, &self.admin_email) {
            return Err(AppError::NotAllowed("Only the author can delete a post".into()));
        }
        self.store.delete_one(Collection::Posts, &Filter::id(post_id)).await?;
        self.store
            .delete_many(Collection::Comments, &Filter::field("postId", post_id))
            .await?;
        Ok(())
    }

    async fn fetch_post(&self, post_id: &str) -> AppResult<Post> {
        let doc = self
            .store
            .find_one(Collection::Posts, &Filter::id(post_id))
            .await?
            .ok_or_else(|| AppError::NotFound("Post not found".into()))?;
        Ok(from_doc(doc)?)
    }

    // ─── Comments ──────────────────────────────────────

    pub async fn create_comment(
        &self,
        actor: &UserProfile,
        post_id: &str,
        req: CreateCommentRequest,
    ) -> AppResult<Comment> {
        self.fetch_post(post_id).await?;
        let content = req.content.trim().to_string();
        if content.is_empty() {
            return Err(AppError::Validation("Comment cannot be empty".into()));
        }
        let comment = Comment {
            id: new_id(),
            post_id: post_id.to_string(),
            user_id: actor.uid.clone(),
            user_name: actor.display_name(),
            user_profile_image: actor.profile_image_url.clone(),
            content,
            likes: vec![],
            timestamp: Utc::now(),
        };
        self.store.insert(Collection::Comments, to_doc(&comment)?).await?;
        Ok(comment)
    }

    pub async fn list_comments(&self, post_id: &str) -> AppResult<Vec<Comment>> {
        let docs = self
            .store
            .find_many(
                Collection::Comments,
                &Filter::field("postId", post_id),
                Some(&Sort::asc("timestamp")),
                None,
            )
            .await?;
        let mut comments = Vec::with_capacity(docs.len());
        for doc in docs {
            comments.push(from_doc(doc)?);
        }
        Ok(comments)
    }

    pub async fn like_comment(&self, actor: &UserProfile, comment_id: &str) -> AppResult<usize> {
        let doc = self
            .store
            .find_one(Collection::Comments, &Filter::id(comment_id))
            .await?
            .ok_or_else(|| AppError::NotFound("Comment not found".into()))?;
        let comment: Comment = from_doc(doc)?;
        if comment.likes.iter().any(|u| u == &actor.uid) {
            self.store
                .pull(Collection::Comments, &Filter::id(comment_id), "likes", json!(actor.uid))
                .await?;
            Ok(comment.likes.len() - 1)
        } else {
            self.store
                .add_to_set(Collection::Comments, &Filter::id(comment_id), "likes", json!(actor.uid))
                .await?;
            Ok(comment.likes.len() + 1)
        }
    }

    pub async fn delete_comment(&self, actor: &UserProfile, comment_id: &str) -> AppResult<()> {
        let doc = self
            .store
            .find_one(Collection::Comments, &Filter::id(comment_id))
            .await?
            .ok_or_else(|| AppError::NotFound("Comment not found".into()))?;
        let comment: Comment = from_doc(doc)?;
        if comment.user_id != actor.uid && !authz::is_global_admin(actor, &self.admin_email) {
            return Err(AppError::NotAllowed("Only the author can delete a comment".into()));
        }
        self.store
            .delete_one(Collection::Comments, &Filter::id(comment_id))
            .await?;
        Ok(())
    }

    // ─── Service listings ──────────────────────────────

    pub async fn create_service(
        &self,
        actor: &UserProfile,
        req: CreateServiceRequest,
    ) -> AppResult<ServiceListing> {
        if req.title.trim().is_empty() {
            return Err(AppError::Validation("Title cannot be empty".into()));
        }
        let service = ServiceListing {
            id: new_id(),
            user_id: actor.uid.clone(),
            user_name: actor.display_name(),
            title: req.title.trim().to_string(),
            description: req.description,
            category: req.category,
            city: actor.city.clone(),
            contact_phone: actor.phone.clone().unwrap_or_default(),
            timestamp: Utc::now(),
        };
        self.store.insert(Collection::Services, to_doc(&service)?).await?;
        Ok(service)
    }

    /// Listings are city-scoped to the viewer.
    pub async fn list_services(&self, viewer: &UserProfile) -> AppResult<Vec<ServiceListing>> {
        let docs = self
            .store
            .find_many(
                Collection::Services,
                &Filter::field("city", viewer.city.as_str()),
                Some(&Sort::desc("timestamp")),
                Some(FEED_PAGE_SIZE),
            )
            .await?;
        let mut services = Vec::with_capacity(docs.len());
        for doc in docs {
            services.push(from_doc(doc)?);
        }
        Ok(services)
    }

    pub async fn delete_service(&self, actor: &UserProfile, service_id: &str) -> AppResult<()> {
        let doc = self
            .store
            .find_one(Collection::Services, &Filter::id(service_id))
            .await?
            .ok_or_else(|| AppError::NotFound("Service not found".into()))?;
        let service: ServiceListing = from_doc(doc)?;
        if service.user_id != actor.uid && !authz::is_global_admin(actor, &self.admin_email) {
            return Err(AppError::NotAllowed("Only the owner can delete a listing".into()));
        }
        self.store
            .delete_one(Collection::Services, &Filter::id(service_id))
            .await?;
        Ok(())
    }

    // ─── Polls ─────────────────────────────────────────

    pub async fn create_poll(
        &self,
        actor: &UserProfile,
        group_id: &str,
        req: CreatePollRequest,
    ) -> AppResult<Poll> {
        let group = fetch_group(&self.store, group_id).await?;
        authz::require(
            authz::resolve_legacy(actor, &group, &self.admin_email),
            PrivilegeLevel::SubGroupAdmin,
        )?;
        if req.question.trim().is_empty() {
            return Err(AppError::Validation("Poll question cannot be empty".into()));
        }
        if req.options.len() < 2 {
            return Err(AppError::Validation("A poll needs at least two options".into()));
        }

        let options = req
            .options
            .into_iter()
            .map(|text| PollOption { id: new_id(), text, votes: vec![] })
            .collect();
        let poll = Poll {
            id: new_id(),
            group_id: group.id.clone(),
            question: req.question.trim().to_string(),
            options,
            created_by: actor.uid.clone(),
            created_by_name: actor.display_name(),
            is_anonymous: req.is_anonymous,
            multiple_choice: req.multiple_choice,
            created_at: Utc::now(),
        };
        self.store.insert(Collection::Polls, to_doc(&poll)?).await?;
        Ok(poll)
    }

    pub async fn list_polls(&self, group_id: &str) -> AppResult<Vec<Poll>> {
        let docs = self
            .store
            .find_many(
                Collection::Polls,
                &Filter::field("groupId", group_id),
                Some(&Sort::desc("createdAt")),
                None,
            )
            .await?;
        let mut polls = Vec::with_capacity(docs.len());
        for doc in docs {
            polls.push(from_doc(doc)?);
        }
        Ok(polls)
    }

    /// Single-choice polls move the vote; multiple-choice polls toggle it.
    pub async fn vote(&self, actor: &UserProfile, poll_id: &str, option_id: &str) -> AppResult<Poll> {
        let doc = self
            .store
            .find_one(Collection::Polls, &Filter::id(poll_id))
            .await?
            .ok_or_else(|| AppError::NotFound("Poll not found".into()))?;
        let mut poll: Poll = from_doc(doc)?;

        if !poll.options.iter().any(|o| o.id == option_id) {
            return Err(AppError::NotFound("Poll option not found".into()));
        }

        for option in poll.options.iter_mut() {
            if option.id == option_id {
                if option.votes.iter().any(|u| u == &actor.uid) {
                    option.votes.retain(|u| u != &actor.uid);
                } else {
                    option.votes.push(actor.uid.clone());
                }
            } else if !poll.multiple_choice {
                option.votes.retain(|u| u != &actor.uid);
            }
        }

        self.store
            .set_fields(
                Collection::Polls,
                &Filter::id(poll_id),
                json!({"options": to_doc(&poll.options)?}),
            )
            .await?;
        Ok(poll)
    }

    pub async fn delete_poll(&self, actor: &UserProfile, poll_id: &str) -> AppResult<()> {
        let doc = self
            .store
            .find_one(Collection::Polls, &Filter::id(poll_id))
            .await?
            .ok_or_else(|| AppError::NotFound("Poll not found".into()))?;
        let poll: Poll = from_doc(doc)?;
        if poll.created_by != actor.uid {
            let group = fetch_group(&self.store, &poll.group_id).await?;
            authz::require(
                authz::resolve_legacy(actor, &group, &self.admin_email),
                PrivilegeLevel::SubGroupAdmin,
            )?;
        }
        self.store.delete_one(Collection::Polls, &Filter::id(poll_id)).await?;
        Ok(())
    }
}
