//! Post handlers.

use actix_web::{HttpResponse, web};
use uuid::Uuid;

use folio_core::domain::{
    Comment, NewPost, Post, PostChanges, PostDetail, PostFilter, PostPage, User,
};
use folio_shared::dto::{
    AuthorDto, CommentDto, CommentsResponse, CreateCommentRequest, CreatePostRequest, PostDto,
    PostResponse, PostsResponse, UpdatePostRequest,
};

use crate::middleware::auth::{Identity, OptionalIdentity};
use crate::middleware::error::{AppError, AppResult};
use crate::state::AppState;

fn comment_dto(comment: Comment) -> CommentDto {
    CommentDto {
        id: comment.id,
        body: comment.body,
        created_at: comment.created_at,
    }
}

fn author_dto(user: &User) -> AuthorDto {
    AuthorDto {
        username: user.username.clone(),
        bio: user.bio.clone(),
        image: user.image.clone(),
    }
}

fn post_dto(post: Post, favorited: bool, author: Option<AuthorDto>) -> PostDto {
    PostDto {
        slug: post.slug,
        title: post.title,
        description: post.description,
        body: post.body,
        tag_list: post.tag_list,
        created_at: post.created_at,
        updated_at: post.updated_at,
        favorited,
        favorites_count: post.favorite_count,
        author_id: post.author_id,
        author,
        comments: None,
    }
}

/// Renders posts for one viewer with a single favorite lookup and a single
/// author lookup, whatever the number of posts.
async fn render_posts(
    state: &AppState,
    viewer: Option<&Identity>,
    posts: Vec<Post>,
) -> AppResult<Vec<PostDto>> {
    let favorited = match viewer {
        Some(identity) => state.posts.favorited_among(identity.user_id, &posts).await?,
        None => Default::default(),
    };
    let authors = state.posts.authors_of(&posts).await?;

    Ok(posts
        .into_iter()
        .map(|post| {
            let is_favorited = favorited.contains(&post.id);
            let author = authors.get(&post.author_id).map(author_dto);
            post_dto(post, is_favorited, author)
        })
        .collect())
}

async fn post_response(
    state: &AppState,
    viewer: Option<&Identity>,
    post: Post,
    comments: Option<Vec<Comment>>,
) -> AppResult<PostResponse> {
    let mut rendered = render_posts(state, viewer, vec![post]).await?;
    let Some(mut post) = rendered.pop() else {
        return Err(AppError::Internal("post vanished while rendering".to_string()));
    };
    post.comments = comments.map(|comments| comments.into_iter().map(comment_dto).collect());
    Ok(PostResponse { post })
}

async fn detail_response(
    state: &AppState,
    viewer: Option<&Identity>,
    detail: PostDetail,
) -> AppResult<PostResponse> {
    post_response(state, viewer, detail.post, Some(detail.comments)).await
}

async fn page_response(
    state: &AppState,
    viewer: Option<&Identity>,
    page: PostPage,
) -> AppResult<PostsResponse> {
    Ok(PostsResponse {
        posts: render_posts(state, viewer, page.posts).await?,
        posts_count: page.total_count,
    })
}

/// GET /api/posts
pub async fn list_posts(
    state: web::Data<AppState>,
    viewer: OptionalIdentity,
    query: web::Query<PostFilter>,
) -> AppResult<HttpResponse> {
    let page = state.posts.list_posts(&query).await?;
    let response = page_response(&state, viewer.0.as_ref(), page).await?;
    Ok(HttpResponse::Ok().json(response))
}

/// GET /api/posts/feed
pub async fn feed(
    state: web::Data<AppState>,
    identity: Identity,
    query: web::Query<PostFilter>,
) -> AppResult<HttpResponse> {
    let page = state.posts.list_feed(identity.user_id, &query).await?;
    let response = page_response(&state, Some(&identity), page).await?;
    Ok(HttpResponse::Ok().json(response))
}

/// GET /api/posts/{slug}
pub async fn get_post(
    state: web::Data<AppState>,
    viewer: OptionalIdentity,
    path: web::Path<String>,
) -> AppResult<HttpResponse> {
    let detail = state.posts.get_by_slug(&path).await?;
    let response = detail_response(&state, viewer.0.as_ref(), detail).await?;
    Ok(HttpResponse::Ok().json(response))
}

/// GET /api/posts/{slug}/comments
pub async fn get_comments(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> AppResult<HttpResponse> {
    let comments = state.posts.get_comments(&path).await?;
    Ok(HttpResponse::Ok().json(CommentsResponse {
        comments: comments.into_iter().map(comment_dto).collect(),
    }))
}

/// POST /api/posts
pub async fn create_post(
    state: web::Data<AppState>,
    identity: Identity,
    body: web::Json<CreatePostRequest>,
) -> AppResult<HttpResponse> {
    let input = body.into_inner().post;
    let post = state
        .posts
        .create(
            identity.user_id,
            NewPost {
                title: input.title,
                description: input.description,
                body: input.body,
                tag_list: input.tag_list,
            },
        )
        .await?;

    let response = post_response(&state, Some(&identity), post, None).await?;
    Ok(HttpResponse::Created().json(response))
}

/// PUT /api/posts/{slug}
pub async fn update_post(
    state: web::Data<AppState>,
    identity: Identity,
    path: web::Path<String>,
    body: web::Json<UpdatePostRequest>,
) -> AppResult<HttpResponse> {
    let input = body.into_inner().post;
    let post = state
        .posts
        .update(
            &path,
            PostChanges {
                title: input.title,
                description: input.description,
                body: input.body,
                tag_list: input.tag_list,
            },
        )
        .await?;

    let response = post_response(&state, Some(&identity), post, None).await?;
    Ok(HttpResponse::Ok().json(response))
}

/// DELETE /api/posts/{slug}
pub async fn delete_post(
    state: web::Data<AppState>,
    _identity: Identity,
    path: web::Path<String>,
) -> AppResult<HttpResponse> {
    state.posts.delete(&path).await?;
    Ok(HttpResponse::NoContent().finish())
}

/// POST /api/posts/{slug}/comments
pub async fn add_comment(
    state: web::Data<AppState>,
    identity: Identity,
    path: web::Path<String>,
    body: web::Json<CreateCommentRequest>,
) -> AppResult<HttpResponse> {
    let detail = state.posts.add_comment(&path, &body.comment.body).await?;
    let response = detail_response(&state, Some(&identity), detail).await?;
    Ok(HttpResponse::Created().json(response))
}

/// DELETE /api/posts/{slug}/comments/{id}
pub async fn delete_comment(
    state: web::Data<AppState>,
    identity: Identity,
    path: web::Path<(String, Uuid)>,
) -> AppResult<HttpResponse> {
    let (slug, comment_id) = path.into_inner();
    let detail = state.posts.delete_comment(&slug, comment_id).await?;
    let response = detail_response(&state, Some(&identity), detail).await?;
    Ok(HttpResponse::Ok().json(response))
}

/// POST /api/posts/{slug}/favorite
pub async fn favorite(
    state: web::Data<AppState>,
    identity: Identity,
    path: web::Path<String>,
) -> AppResult<HttpResponse> {
    let post = state.posts.favorite(identity.user_id, &path).await?;
    let response = post_response(&state, Some(&identity), post, None).await?;
    Ok(HttpResponse::Ok().json(response))
}

/// DELETE /api/posts/{slug}/favorite
pub async fn unfavorite(
    state: web::Data<AppState>,
    identity: Identity,
    path: web::Path<String>,
) -> AppResult<HttpResponse> {
    let post = state.posts.unfavorite(identity.user_id, &path).await?;
    let response = post_response(&state, Some(&identity), post, None).await?;
    Ok(HttpResponse::Ok().json(response))
}
