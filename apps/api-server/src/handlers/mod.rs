//! HTTP handlers and route configuration.

mod health;
mod posts;

use actix_web::web;

/// Configure all application routes.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .route("/health", web::get().to(health::health_check))
            .service(
                web::scope("/posts")
                    .route("", web::get().to(posts::list_posts))
                    .route("", web::post().to(posts::create_post))
                    // Registered before `/{slug}` so "feed" is never read as a slug.
                    .route("/feed", web::get().to(posts::feed))
                    .route("/{slug}", web::get().to(posts::get_post))
                    .route("/{slug}", web::put().to(posts::update_post))
                    .route("/{slug}", web::delete().to(posts::delete_post))
                    .route("/{slug}/comments", web::get().to(posts::get_comments))
                    .route("/{slug}/comments", web::post().to(posts::add_comment))
                    .route(
                        "/{slug}/comments/{id}",
                        web::delete().to(posts::delete_comment),
                    )
                    .route("/{slug}/favorite", web::post().to(posts::favorite))
                    .route("/{slug}/favorite", web::delete().to(posts::unfavorite)),
            ),
    );
}
