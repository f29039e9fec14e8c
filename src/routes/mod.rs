pub mod health;
pub mod tasks;
pub mod users;

use actix_web::web;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/users")
            .service(users::signup)
            .service(users::login)
            .service(users::logout)
            .service(users::logout_all)
            .service(users::me)
            .service(users::update_profile)
            .service(users::delete_account)
            // /me/avatar must be registered before /{id}/avatar so the
            // literal segment wins.
            .service(users::upload_avatar)
            .service(users::delete_avatar)
            .service(users::get_avatar),
    )
    .service(
        web::scope("/tasks")
            .service(tasks::list_tasks)
            .service(tasks::create_task)
            .service(tasks::get_task)
            .service(tasks::update_task)
            .service(tasks::delete_task),
    );
}
