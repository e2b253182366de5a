use crate::api::{ApiErrorKind, PublishPostRequest, ReactionTarget};
use crate::comments::{
    build_tree, count_reactions_by_symbol, user_reacted, CommentError, CommentNode, CommentStore,
    SubmitFailure,
};
use crate::drafts::{AutosaveController, DraftFields, LocalDraftStore, SeoMeta};
use crate::models::{AccountInfo, AuthorRef, Post, ReactionValue};
use crate::state::AppContext;
use crate::storage::save_user_to_storage;
use crate::util::now_ms;
use leptos::ev;
use leptos::prelude::*;
use leptos::task::spawn_local;
use leptos_dom::helpers::window_event_listener;
use leptos_router::hooks::{use_navigate, use_params_map};
use wasm_bindgen::JsCast;

pub(crate) const DEFAULT_REACTION_SYMBOLS: &[&str] = &["👍", "❤️", "😂", "👏", "🔥", "🎉"];

/// Editor debounce, matching the product default of 3s of idle typing.
const AUTOSAVE_DEBOUNCE_MS: i32 = 3000;

fn author_from(user: &AccountInfo) -> AuthorRef {
    AuthorRef {
        id: user.id().unwrap_or_default(),
        name: user.name().unwrap_or_else(|| "You".to_string()),
        avatar: None,
    }
}

#[component]
pub fn LoginPage() -> impl IntoView {
    let email: RwSignal<String> = RwSignal::new(String::new());
    let password: RwSignal<String> = RwSignal::new(String::new());
    let error: RwSignal<Option<String>> = RwSignal::new(None);
    let loading: RwSignal<bool> = RwSignal::new(false);

    let app_state = expect_context::<AppContext>();

    let on_submit = move |ev: web_sys::SubmitEvent| {
        ev.prevent_default();

        let email_val = email.get();
        let password_val = password.get();
        let mut api_client = app_state.0.api_client.get_untracked();

        loading.set(true);
        error.set(None);

        spawn_local(async move {
            match api_client.login(&email_val, &password_val).await {
                Ok(response) => {
                    api_client.set_token(response.token);
                    api_client.save_to_storage();
                    save_user_to_storage(&response.user);
                    app_state.0.api_client.set(api_client);
                    app_state.0.current_user.set(Some(response.user));
                    let _ = window().location().set_href("/");
                }
                Err(e) => {
                    error.set(Some(e.to_string()));
                }
            }
            loading.set(false);
        });
    };

    view! {
        <div class="min-h-screen bg-background">
            <div class="mx-auto flex min-h-screen w-full max-w-md flex-col justify-center px-4 py-12">
                <div class="mb-6">
                    <a href="/" class="text-sm font-medium text-foreground">"OpenDraft"</a>
                    <div class="text-xs text-muted-foreground">"Write, publish, discuss."</div>
                </div>

                <form class="flex flex-col gap-4 rounded-md border p-6" on:submit=on_submit>
                    <div class="flex flex-col gap-2">
                        <label class="text-sm" for="email">"Email"</label>
                        <input
                            id="email"
                            type="email"
                            class="h-9 rounded-md border px-3 text-sm"
                            placeholder="you@example.com"
                            required=true
                            prop:value=move || email.get()
                            on:input=move |ev| email.set(event_target_value(&ev))
                        />
                    </div>

                    <div class="flex flex-col gap-2">
                        <label class="text-sm" for="password">"Password"</label>
                        <input
                            id="password"
                            type="password"
                            class="h-9 rounded-md border px-3 text-sm"
                            placeholder="••••••••"
                            required=true
                            prop:value=move || password.get()
                            on:input=move |ev| password.set(event_target_value(&ev))
                        />
                    </div>

                    <Show when=move || error.get().is_some() fallback=|| ().into_view()>
                        <div class="rounded-md border border-destructive/30 p-2 text-xs text-destructive">
                            {move || error.get().unwrap_or_default()}
                        </div>
                    </Show>

                    <button
                        class="h-9 rounded-md bg-primary text-sm text-primary-foreground disabled:opacity-50"
                        disabled=move || loading.get()
                    >
                        {move || if loading.get() { "Signing in..." } else { "Sign in" }}
                    </button>
                </form>
            </div>
        </div>
    }
}

#[component]
pub fn HomePage() -> impl IntoView {
    let app_state = expect_context::<AppContext>();

    let posts: RwSignal<Vec<Post>> = RwSignal::new(vec![]);
    let loading: RwSignal<bool> = RwSignal::new(false);
    let error: RwSignal<Option<String>> = RwSignal::new(None);

    let load_posts = move || {
        let api_client = app_state.0.api_client.get_untracked();
        loading.set(true);
        error.set(None);

        spawn_local(async move {
            match api_client.get_posts().await {
                Ok(list) => posts.set(list),
                Err(e) => error.set(Some(e.to_string())),
            }
            loading.set(false);
        });
    };

    Effect::new(move |_| {
        load_posts();
    });

    let on_logout = move |_| {
        let mut api_client = app_state.0.api_client.get_untracked();
        api_client.logout();
        app_state.0.api_client.set(api_client);
        app_state.0.current_user.set(None);
        let _ = window().location().set_href("/");
    };

    let is_authenticated = move || app_state.0.api_client.get().is_authenticated();

    view! {
        <div class="min-h-screen bg-background">
            <div class="mx-auto w-full max-w-[760px] px-4 py-8">
                <div class="mb-6 flex items-center justify-between">
                    <div class="space-y-1">
                        <h1 class="text-xl font-semibold">"OpenDraft"</h1>
                        <p class="text-xs text-muted-foreground">"Latest posts"</p>
                    </div>

                    <div class="flex items-center gap-2">
                        <Show
                            when=is_authenticated
                            fallback=|| view! {
                                <a class="text-sm text-primary underline underline-offset-4" href="/login">"Sign in"</a>
                            }
                        >
                            <a class="text-sm text-primary underline underline-offset-4" href="/editor">"New post"</a>
                            <button class="text-sm text-muted-foreground" on:click=on_logout>"Sign out"</button>
                        </Show>
                    </div>
                </div>

                <Show when=move || error.get().is_some() fallback=|| ().into_view()>
                    <div class="mb-4 rounded-md border border-destructive/30 p-2 text-xs text-destructive">
                        {move || error.get().unwrap_or_default()}
                    </div>
                </Show>

                <Show
                    when=move || !posts.get().is_empty()
                    fallback=move || view! {
                        <div class="text-xs text-muted-foreground">
                            {move || if loading.get() { "Loading posts..." } else { "No posts yet." }}
                        </div>
                    }
                >
                    <div class="flex flex-col gap-3">
                        {move || {
                            posts
                                .get()
                                .into_iter()
                                .map(|p| {
                                    let href = format!("/post/{}", urlencoding::encode(&p.slug));
                                    view! {
                                        <a class="rounded-md border px-4 py-3 hover:bg-accent/40" href=href>
                                            <div class="text-sm font-medium">{p.title}</div>
                                            <div class="text-xs text-muted-foreground">
                                                {p.excerpt.unwrap_or_default()}
                                            </div>
                                        </a>
                                    }
                                })
                                .collect_view()
                        }}
                    </div>
                </Show>
            </div>
        </div>
    }
}

/// Everything the recursive thread renderer needs besides the node.
#[derive(Clone)]
struct ThreadCtx {
    user_id: Option<String>,
    authenticated: bool,
    reply_to: RwSignal<Option<String>>,
    reply_text: RwSignal<String>,
    on_reply_submit: Callback<String>,
    on_toggle: Callback<(String, String)>,
}

fn render_reaction_bar(
    counts: std::collections::BTreeMap<String, u64>,
    reacted: impl Fn(&str) -> bool,
    disabled: bool,
    on_react: impl Fn(String) + Clone + 'static,
) -> AnyView {
    view! {
        <div class="flex flex-wrap items-center gap-1">
            {DEFAULT_REACTION_SYMBOLS
                .iter()
                .map(|&symbol| {
                    let count = counts.get(symbol).copied().unwrap_or(0);
                    let active = reacted(symbol);
                    let class = if active {
                        "rounded-full border border-primary bg-primary/10 px-2 py-0.5 text-sm"
                    } else {
                        "rounded-full border px-2 py-0.5 text-sm text-muted-foreground"
                    };
                    let on_react = on_react.clone();
                    let symbol_owned = symbol.to_string();
                    view! {
                        <button
                            class=class
                            disabled=disabled
                            on:click=move |_| on_react(symbol_owned.clone())
                        >
                            {symbol}
                            <Show when={move || count > 0} fallback=|| ().into_view()>
                                <span class="ml-1 text-xs font-semibold">{count}</span>
                            </Show>
                        </button>
                    }
                })
                .collect_view()}
        </div>
    }
    .into_any()
}

fn render_comment_node(node: CommentNode, depth: usize, ctx: ThreadCtx) -> AnyView {
    let record = node.record;
    let comment_id = record.id.clone();
    let pending = record.pending;
    let counts = count_reactions_by_symbol(&record);

    let reacted = {
        let record = record.clone();
        let user_id = ctx.user_id.clone();
        move |symbol: &str| {
            user_id
                .as_deref()
                .map(|u| user_reacted(&record, symbol, u))
                .unwrap_or(false)
        }
    };

    let on_react = {
        let comment_id = comment_id.clone();
        let on_toggle = ctx.on_toggle;
        move |symbol: String| on_toggle.run((comment_id.clone(), symbol))
    };

    let reply_open = {
        let comment_id = comment_id.clone();
        let reply_to = ctx.reply_to;
        move || reply_to.get().as_deref() == Some(comment_id.as_str())
    };

    let open_reply = {
        let comment_id = comment_id.clone();
        let reply_to = ctx.reply_to;
        let reply_text = ctx.reply_text;
        Callback::new(move |_: ()| {
            reply_text.set(String::new());
            reply_to.set(Some(comment_id.clone()));
        })
    };

    let submit_reply = {
        let comment_id = comment_id.clone();
        let on_reply_submit = ctx.on_reply_submit;
        move |_| on_reply_submit.run(comment_id.clone())
    };

    let cancel_reply = {
        let reply_to = ctx.reply_to;
        move |_| reply_to.set(None)
    };

    let children_view = node
        .children
        .into_iter()
        .map(|c| render_comment_node(c, depth + 1, ctx.clone()))
        .collect_view();

    let indent_px = (depth.min(6) * 24) as i32;
    let reply_text = ctx.reply_text;
    let authenticated = ctx.authenticated;

    view! {
        <div style=format!("margin-left: {}px", indent_px) class="mb-2">
            <div class="rounded-md border px-4 py-3">
                <div class="mb-1 flex items-center gap-2">
                    <span class="text-sm font-medium">{record.author.name.clone()}</span>
                    <span class="ml-auto text-xs text-muted-foreground">
                        {if pending {
                            "Posting...".to_string()
                        } else {
                            record.created_at.clone()
                        }}
                    </span>
                </div>

                <div class="text-sm">{record.content.clone()}</div>

                <Show when=move || !pending fallback=|| ().into_view()>
                    <div class="mt-2 flex items-center gap-3">
                        {render_reaction_bar(
                            counts.clone(),
                            reacted.clone(),
                            !authenticated,
                            on_react.clone(),
                        )}

                        <Show when=move || authenticated fallback=|| ().into_view()>
                            <button
                                class="text-xs text-primary underline underline-offset-4"
                                on:click=move |_| open_reply.run(())
                            >
                                "Reply"
                            </button>
                        </Show>
                    </div>
                </Show>

                <Show when=reply_open.clone() fallback=|| ().into_view()>
                    <div class="mt-2 flex flex-col gap-2">
                        <textarea
                            class="min-h-16 rounded-md border px-3 py-2 text-sm"
                            placeholder="Write a reply..."
                            prop:value=move || reply_text.get()
                            on:input=move |ev| reply_text.set(event_target_value(&ev))
                        />
                        <div class="flex gap-2">
                            <button
                                class="h-8 rounded-md bg-primary px-3 text-xs text-primary-foreground disabled:opacity-50"
                                disabled=move || reply_text.get().trim().is_empty()
                                on:click=submit_reply.clone()
                            >
                                "Post reply"
                            </button>
                            <button class="h-8 px-3 text-xs text-muted-foreground" on:click=cancel_reply>
                                "Cancel"
                            </button>
                        </div>
                    </div>
                </Show>
            </div>

            {children_view}
        </div>
    }
    .into_any()
}

#[component]
pub fn PostDetailPage() -> impl IntoView {
    let app_state = expect_context::<AppContext>();
    let params = use_params_map();

    let slug = move || params.get().get("slug").unwrap_or_default();

    let post: RwSignal<Option<Post>> = RwSignal::new(None);
    let store_sig: RwSignal<Option<CommentStore>> = RwSignal::new(None);
    let loading: RwSignal<bool> = RwSignal::new(true);
    let error: RwSignal<Option<String>> = RwSignal::new(None);

    let comment_text: RwSignal<String> = RwSignal::new(String::new());
    let reply_to: RwSignal<Option<String>> = RwSignal::new(None);
    let reply_text: RwSignal<String> = RwSignal::new(String::new());

    // Failed submissions hand the typed content back so the user can
    // retry; the optimistic record itself is already rolled back.
    let on_submit_failure = Callback::new(move |f: SubmitFailure| {
        match &f.parent_id {
            Some(parent) => {
                reply_text.set(f.content.clone());
                reply_to.set(Some(parent.clone()));
            }
            None => comment_text.set(f.content.clone()),
        }
        error.set(Some(f.error.to_string()));
    });

    let on_reaction_failure = Callback::new(move |e: CommentError| {
        error.set(Some(e.to_string()));
    });

    Effect::new(move |_| {
        let s = slug();
        if s.trim().is_empty() {
            return;
        }

        let api_client = app_state.0.api_client.get_untracked();
        loading.set(true);
        error.set(None);

        spawn_local(async move {
            match api_client.get_post(&s).await {
                Ok(p) => {
                    let store = CommentStore::new(&p.id, p.reactions.clone());
                    let post_id = p.id.clone();
                    post.set(Some(p));
                    store_sig.set(Some(store.clone()));

                    match api_client.get_comments_by_post(&post_id).await {
                        Ok(records) => store.set_comments(records),
                        Err(e) => error.set(Some(e.to_string())),
                    }
                }
                Err(e) => {
                    if e.kind == ApiErrorKind::Http {
                        error.set(Some("Post not found".to_string()));
                    } else {
                        error.set(Some(e.to_string()));
                    }
                }
            }
            loading.set(false);
        });
    });

    let on_toggle = Callback::new(move |(comment_id, symbol): (String, String)| {
        let Some(store) = store_sig.get_untracked() else {
            return;
        };
        let Some(user_id) = app_state.0.current_user.get_untracked().and_then(|u| u.id())
        else {
            error.set(Some("Please sign in to react".to_string()));
            return;
        };

        let api_client = app_state.0.api_client.get_untracked();
        if let Err(e) = store.toggle_reaction(
            api_client,
            &user_id,
            ReactionTarget::Comment(comment_id),
            &symbol,
            on_reaction_failure,
        ) {
            error.set(Some(e.to_string()));
        }
    });

    let on_post_react = move |symbol: String| {
        let Some(store) = store_sig.get_untracked() else {
            return;
        };
        let Some(p) = post.get_untracked() else {
            return;
        };
        let Some(user_id) = app_state.0.current_user.get_untracked().and_then(|u| u.id())
        else {
            error.set(Some("Please sign in to react".to_string()));
            return;
        };

        let api_client = app_state.0.api_client.get_untracked();
        if let Err(e) = store.toggle_reaction(
            api_client,
            &user_id,
            ReactionTarget::Post(p.id),
            &symbol,
            on_reaction_failure,
        ) {
            error.set(Some(e.to_string()));
        }
    };

    let on_reply_submit = Callback::new(move |parent_id: String| {
        let Some(store) = store_sig.get_untracked() else {
            return;
        };
        let Some(user) = app_state.0.current_user.get_untracked() else {
            return;
        };
        let text = reply_text.get_untracked();
        if text.trim().is_empty() {
            return;
        }

        let api_client = app_state.0.api_client.get_untracked();
        match store.submit_comment(
            api_client,
            author_from(&user),
            text,
            Some(parent_id),
            on_submit_failure,
        ) {
            Ok(()) => {
                reply_text.set(String::new());
                reply_to.set(None);
            }
            Err(e) => error.set(Some(e.to_string())),
        }
    });

    let on_comment_submit = move |ev: web_sys::SubmitEvent| {
        ev.prevent_default();

        let Some(store) = store_sig.get_untracked() else {
            return;
        };
        let Some(user) = app_state.0.current_user.get_untracked() else {
            return;
        };
        let text = comment_text.get_untracked();
        if text.trim().is_empty() {
            return;
        }

        let api_client = app_state.0.api_client.get_untracked();
        match store.submit_comment(api_client, author_from(&user), text, None, on_submit_failure) {
            Ok(()) => comment_text.set(String::new()),
            Err(e) => error.set(Some(e.to_string())),
        }
    };

    let is_authenticated = move || app_state.0.api_client.get().is_authenticated();

    view! {
        <div class="min-h-screen bg-background">
            <div class="mx-auto w-full max-w-[760px] px-4 py-8">
                <div class="mb-4">
                    <a href="/" class="text-xs text-muted-foreground hover:text-foreground">"← All posts"</a>
                </div>

                <Show when=move || error.get().is_some() fallback=|| ().into_view()>
                    <div class="mb-4 rounded-md border border-destructive/30 p-2 text-xs text-destructive">
                        {move || error.get().unwrap_or_default()}
                    </div>
                </Show>

                {move || {
                    let Some(p) = post.get() else {
                        return view! {
                            <div class="text-xs text-muted-foreground">
                                {move || if loading.get() { "Loading post..." } else { "Post not found" }}
                            </div>
                        }
                        .into_any();
                    };

                    let user_id = app_state.0.current_user.get().and_then(|u| u.id());
                    let store = store_sig.get();

                    let post_reaction_bar = store
                        .as_ref()
                        .map(|s| {
                            let ledger = s.post_reactions.get();
                            let counts: std::collections::BTreeMap<String, u64> = ledger
                                .iter()
                                .map(|(k, v)| (k.clone(), v.count()))
                                .collect();
                            let reacted = {
                                let user_id = user_id.clone();
                                move |symbol: &str| {
                                    match (ledger.get(symbol), user_id.as_deref()) {
                                        (Some(ReactionValue::Reactors(ids)), Some(u)) => {
                                            ids.iter().any(|id| id == u)
                                        }
                                        _ => false,
                                    }
                                }
                            };
                            render_reaction_bar(
                                counts,
                                reacted,
                                !is_authenticated(),
                                on_post_react,
                            )
                        })
                        .unwrap_or_else(|| ().into_view().into_any());

                    view! {
                        <article>
                            <h1 class="mb-1 text-2xl font-semibold">{p.title.clone()}</h1>
                            <div class="mb-4 flex items-center gap-2 text-xs text-muted-foreground">
                                <span>{p.author.name.clone()}</span>
                                <span>{p.created_at.clone()}</span>
                            </div>

                            <Show when={let has = !p.tags.is_empty(); move || has} fallback=|| ().into_view()>
                                <div class="mb-4 flex flex-wrap gap-1">
                                    {p.tags
                                        .iter()
                                        .map(|t| view! {
                                            <span class="rounded-full border px-2 py-0.5 text-xs">{t.clone()}</span>
                                        })
                                        .collect_view()}
                                </div>
                            </Show>

                            <div class="prose mb-6 text-sm leading-relaxed" inner_html=p.content.clone()></div>

                            <div class="mb-6">{post_reaction_bar}</div>
                        </article>
                    }
                    .into_any()
                }}

                <div class="border-t pt-6">
                    {move || {
                        let count = store_sig
                            .get()
                            .map(|s| s.comments.get().len())
                            .unwrap_or(0);
                        view! {
                            <h2 class="mb-4 text-lg font-medium">{format!("Comments ({count})")}</h2>
                        }
                    }}

                    <Show when=is_authenticated fallback=|| view! {
                        <div class="mb-4 text-xs text-muted-foreground">
                            <a class="text-primary underline underline-offset-4" href="/login">"Sign in"</a>
                            " to join the discussion."
                        </div>
                    }>
                        <form class="mb-6 flex flex-col gap-2" on:submit=on_comment_submit>
                            <textarea
                                class="min-h-24 rounded-md border px-3 py-2 text-sm"
                                placeholder="Write a comment..."
                                prop:value=move || comment_text.get()
                                on:input=move |ev| comment_text.set(event_target_value(&ev))
                            />
                            <button
                                class="h-9 self-start rounded-md bg-primary px-4 text-sm text-primary-foreground disabled:opacity-50"
                                disabled=move || comment_text.get().trim().is_empty()
                            >
                                "Post comment"
                            </button>
                        </form>
                    </Show>

                    {move || {
                        let Some(store) = store_sig.get() else {
                            return ().into_view().into_any();
                        };
                        let records = store.comments.get();
                        if records.is_empty() {
                            return view! {
                                <div class="py-4 text-center text-xs text-muted-foreground">
                                    "No comments yet. Be the first to comment!"
                                </div>
                            }
                            .into_any();
                        }

                        let ctx = ThreadCtx {
                            user_id: app_state.0.current_user.get().and_then(|u| u.id()),
                            authenticated: is_authenticated(),
                            reply_to,
                            reply_text,
                            on_reply_submit,
                            on_toggle,
                        };

                        build_tree(&records)
                            .into_iter()
                            .map(|node| render_comment_node(node, 0, ctx.clone()))
                            .collect_view()
                            .into_any()
                    }}
                </div>
            </div>
        </div>
    }
}

#[component]
pub fn RequireAuth(children: ChildrenFn) -> impl IntoView {
    let app_state = expect_context::<AppContext>();
    let is_authenticated = move || app_state.0.api_client.get().is_authenticated();

    // Store children so the view macro sees an `Fn` (not an `FnOnce`).
    let children = StoredValue::new(children);

    view! {
        <Show when=is_authenticated fallback=move || view! { <LoginPage /> }>
            {move || children.with_value(|c| c())}
        </Show>
    }
}

#[component]
pub fn EditorPage() -> impl IntoView {
    let app_state = expect_context::<AppContext>();
    let navigate = use_navigate();

    let title: RwSignal<String> = RwSignal::new(String::new());
    let content: RwSignal<String> = RwSignal::new(String::new());
    let excerpt: RwSignal<String> = RwSignal::new(String::new());
    let category: RwSignal<String> = RwSignal::new(String::new());
    let tags_input: RwSignal<String> = RwSignal::new(String::new());
    let meta_title: RwSignal<String> = RwSignal::new(String::new());
    let meta_description: RwSignal<String> = RwSignal::new(String::new());

    let error: RwSignal<Option<String>> = RwSignal::new(None);
    let publishing: RwSignal<bool> = RwSignal::new(false);

    // One controller per editing session; "post_new" is the stable key
    // for the not-yet-published draft.
    let controller = AutosaveController::new(LocalDraftStore, "post_new", AUTOSAVE_DEBOUNCE_MS);

    let current_fields = move || DraftFields {
        title: title.get(),
        content: content.get(),
        excerpt: excerpt.get(),
        category: category.get(),
        tags: tags_input
            .get()
            .split(',')
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect(),
        seo: SeoMeta {
            meta_title: meta_title.get(),
            meta_description: meta_description.get(),
        },
    };

    let apply_fields = move |f: &DraftFields| {
        title.set(f.title.clone());
        content.set(f.content.clone());
        excerpt.set(f.excerpt.clone());
        category.set(f.category.clone());
        tags_input.set(f.tags.join(", "));
        meta_title.set(f.seo.meta_title.clone());
        meta_description.set(f.seo.meta_description.clone());
    };

    // Offer to restore the previous session's draft before observing
    // anything, so the offer itself cannot be overwritten.
    let restore_offer: RwSignal<Option<DraftFields>> = RwSignal::new(controller.load_persisted());

    {
        let controller = controller.clone();
        Effect::new(move |_| {
            // Don't watch the empty form while a restore offer is open.
            if restore_offer.get().is_some() {
                return;
            }
            controller.observe(&current_fields());
        });
    }

    let on_restore = move |_| {
        if let Some(f) = restore_offer.get_untracked() {
            apply_fields(&f);
            restore_offer.set(None);
        }
    };

    let on_dismiss_restore = {
        let controller = controller.clone();
        move |_| {
            controller.discard();
            restore_offer.set(None);
        }
    };

    let do_save_now = {
        let controller = controller.clone();
        move || {
            controller.observe(&current_fields());
            if let Err(e) = controller.save_now() {
                error.set(Some(e.to_string()));
            }
        }
    };

    let on_save_click = {
        let do_save_now = do_save_now.clone();
        move |_| do_save_now()
    };

    // Ctrl+S / Cmd+S saves the draft immediately.
    let keydown_handle = {
        let do_save_now = do_save_now.clone();
        window_event_listener(ev::keydown, move |ev: web_sys::KeyboardEvent| {
            if (ev.ctrl_key() || ev.meta_key()) && ev.key().eq_ignore_ascii_case("s") {
                ev.prevent_default();
                do_save_now();
            }
        })
    };
    let keydown_handle = StoredValue::new(Some(keydown_handle));

    // Re-render the "saved N minutes ago" line periodically. The timer
    // is component-scoped, so its handle is kept for cleanup; a stray
    // interval would keep writing a disposed signal after unmount.
    let now_tick: RwSignal<i64> = RwSignal::new(0);
    let tick_timer_id: StoredValue<Option<i32>> = StoredValue::new(None);
    if let Some(win) = web_sys::window() {
        let cb = wasm_bindgen::closure::Closure::wrap(Box::new(move || {
            now_tick.set(now_ms());
        }) as Box<dyn FnMut()>);
        let id = win
            .set_interval_with_callback_and_timeout_and_arguments_0(
                cb.as_ref().unchecked_ref(),
                30_000,
            )
            .unwrap_or(0);
        cb.forget();
        tick_timer_id.set_value(Some(id));
    }

    {
        let controller = controller.clone();
        on_cleanup(move || {
            controller.teardown();
            keydown_handle.update_value(|h| {
                if let Some(h) = h.take() {
                    h.remove();
                }
            });
            if let Some(id) = tick_timer_id.get_value() {
                if let Some(win) = web_sys::window() {
                    win.clear_interval_with_handle(id);
                }
            }
            tick_timer_id.set_value(None);
        });
    }

    let status_line = {
        let controller = controller.clone();
        move || {
            let _ = now_tick.get();
            if controller.is_saving() {
                "Saving draft...".to_string()
            } else if controller.is_dirty() {
                "Unsaved changes".to_string()
            } else {
                format!("Draft saved · {}", controller.last_saved_text(now_ms()))
            }
        }
    };

    let on_publish = {
        let controller = controller.clone();
        move |_| {
            let f = current_fields();
            if f.title.trim().is_empty() || f.content.trim().is_empty() {
                error.set(Some("Title and content are required".to_string()));
                return;
            }

            let api_client = app_state.0.api_client.get_untracked();
            if !api_client.is_authenticated() {
                let _ = window().location().set_href("/login");
                return;
            }

            publishing.set(true);
            error.set(None);

            let controller = controller.clone();
            let navigate2 = navigate.clone();
            spawn_local(async move {
                let req = PublishPostRequest {
                    title: f.title.clone(),
                    content: f.content.clone(),
                    excerpt: (!f.excerpt.trim().is_empty()).then(|| f.excerpt.clone()),
                    category: (!f.category.trim().is_empty()).then(|| f.category.clone()),
                    tags: f.tags.clone(),
                    meta_title: (!f.seo.meta_title.trim().is_empty())
                        .then(|| f.seo.meta_title.clone()),
                    meta_description: (!f.seo.meta_description.trim().is_empty())
                        .then(|| f.seo.meta_description.clone()),
                };

                match api_client.publish_post(req).await {
                    Ok(p) => {
                        // Published: the local draft must not resurrect.
                        controller.discard();
                        navigate2(
                            &format!("/post/{}", urlencoding::encode(&p.slug)),
                            leptos_router::NavigateOptions::default(),
                        );
                    }
                    Err(e) => {
                        error.set(Some(e.to_string()));
                    }
                }
                publishing.set(false);
            });
        }
    };

    view! {
        <div class="min-h-screen bg-background">
            <div class="mx-auto w-full max-w-[760px] px-4 py-8">
                <div class="mb-6 flex items-center justify-between">
                    <h1 class="text-xl font-semibold">"New post"</h1>
                    <div class="text-xs text-muted-foreground">{status_line}</div>
                </div>

                <Show when=move || restore_offer.get().is_some() fallback=|| ().into_view()>
                    <div class="mb-4 flex items-center gap-3 rounded-md border p-3 text-sm">
                        <span>"You have an unsaved draft from a previous session."</span>
                        <button
                            class="h-8 rounded-md bg-primary px-3 text-xs text-primary-foreground"
                            on:click=on_restore.clone()
                        >
                            "Restore draft"
                        </button>
                        <button
                            class="h-8 px-3 text-xs text-muted-foreground"
                            on:click=on_dismiss_restore.clone()
                        >
                            "Discard"
                        </button>
                    </div>
                </Show>

                <Show when=move || error.get().is_some() fallback=|| ().into_view()>
                    <div class="mb-4 rounded-md border border-destructive/30 p-2 text-xs text-destructive">
                        {move || error.get().unwrap_or_default()}
                    </div>
                </Show>

                <div class="flex flex-col gap-4">
                    <input
                        class="h-10 rounded-md border px-3 text-base"
                        placeholder="Post title"
                        prop:value=move || title.get()
                        on:input=move |ev| title.set(event_target_value(&ev))
                    />

                    <textarea
                        class="min-h-64 rounded-md border px-3 py-2 text-sm"
                        placeholder="Write your post..."
                        prop:value=move || content.get()
                        on:input=move |ev| content.set(event_target_value(&ev))
                    />

                    <textarea
                        class="min-h-16 rounded-md border px-3 py-2 text-sm"
                        placeholder="Excerpt (optional)"
                        prop:value=move || excerpt.get()
                        on:input=move |ev| excerpt.set(event_target_value(&ev))
                    />

                    <div class="grid grid-cols-2 gap-4">
                        <input
                            class="h-9 rounded-md border px-3 text-sm"
                            placeholder="Category"
                            prop:value=move || category.get()
                            on:input=move |ev| category.set(event_target_value(&ev))
                        />
                        <input
                            class="h-9 rounded-md border px-3 text-sm"
                            placeholder="Tags, comma separated"
                            prop:value=move || tags_input.get()
                            on:input=move |ev| tags_input.set(event_target_value(&ev))
                        />
                    </div>

                    <details class="rounded-md border p-3">
                        <summary class="cursor-pointer text-sm">"SEO settings"</summary>
                        <div class="mt-3 flex flex-col gap-3">
                            <input
                                class="h-9 rounded-md border px-3 text-sm"
                                placeholder="Meta title"
                                prop:value=move || meta_title.get()
                                on:input=move |ev| meta_title.set(event_target_value(&ev))
                            />
                            <textarea
                                class="min-h-16 rounded-md border px-3 py-2 text-sm"
                                placeholder="Meta description"
                                prop:value=move || meta_description.get()
                                on:input=move |ev| meta_description.set(event_target_value(&ev))
                            />
                        </div>
                    </details>

                    <div class="flex items-center gap-2">
                        <button
                            class="h-9 rounded-md bg-primary px-4 text-sm text-primary-foreground disabled:opacity-50"
                            disabled=move || publishing.get()
                            on:click=on_publish
                        >
                            {move || if publishing.get() { "Publishing..." } else { "Publish" }}
                        </button>
                        <button
                            class="h-9 rounded-md border px-4 text-sm"
                            on:click=on_save_click
                        >
                            "Save draft"
                        </button>
                    </div>
                </div>
            </div>
        </div>
    }
}
