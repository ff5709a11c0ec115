use std::convert::Infallible;

use warp::Filter;

use crate::{LinkForm, XsrfForm, render::Renderer};

fn with_renderer(renderer: Renderer) -> impl Filter<Extract = (Renderer,), Error = Infallible> + Clone {
    warp::any().map(move || renderer.clone())
}

fn form_body<T: serde::de::DeserializeOwned + Send + 'static>() -> impl Filter<Extract = (T,), Error = warp::Rejection> + Clone {
    warp::body::content_length_limit(1024 * 16).and(warp::body::form())
}

fn home(renderer: Renderer) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::get()
        .and(warp::path::end())
        .and(with_renderer(renderer))
        .and_then(|renderer: Renderer| async move { renderer.home().await })
}

fn edit(renderer: Renderer) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::get()
        .and(warp::path!(".edit" / String))
        .and(with_renderer(renderer))
        .and_then(|key: String, renderer: Renderer| async move { renderer.edit(&key).await })
}

fn cancel(renderer: Renderer) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::get()
        .and(warp::path!(".cancel"))
        .and(with_renderer(renderer))
        .and_then(|renderer: Renderer| async move { renderer.cancel().await })
}

fn submit(renderer: Renderer) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::post()
        .and(warp::path!(".create"))
        .and(form_body::<LinkForm>())
        .and(with_renderer(renderer))
        .and_then(|form: LinkForm, renderer: Renderer| async move { renderer.submit(form).await })
}

fn delete(renderer: Renderer) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::post()
        .and(warp::path!(".delete" / String))
        .and(form_body::<XsrfForm>())
        .and(with_renderer(renderer))
        .and_then(
            |key: String, form: XsrfForm, renderer: Renderer| async move { renderer.delete(&key, form).await },
        )
}

fn assets(assets_dir: String) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::path(".assets").and(warp::fs::dir(assets_dir))
}

fn resolve(renderer: Renderer) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::get()
        .and(warp::path!(String))
        .and(with_renderer(renderer))
        .and_then(|key_or_alias: String, renderer: Renderer| async move {
            let decoded = urlencoding::decode(&key_or_alias)
                .map(|s| s.into_owned())
                .unwrap_or(key_or_alias);
            renderer.redirect(&decoded).await
        })
}

/// Every page of the frontend. Short links match last so the dotted paths win.
pub fn get_routes(
    renderer: Renderer,
    assets_dir: String,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    home(renderer.clone())
        .or(assets(assets_dir))
        .or(edit(renderer.clone()))
        .or(cancel(renderer.clone()))
        .or(submit(renderer.clone()))
        .or(delete(renderer.clone()))
        .or(resolve(renderer))
}
