use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{
    parse::{Parse, ParseStream}, parse_macro_input, Data, DataStruct, DeriveInput, Fields, GenericArgument, Ident, LitStr, PathArguments, Token, Type, TypePath
};

struct LinkedAttribute {
    crate_path: syn::Path,
}

/// Parses the attribute in the format: `crate_path = "path::to::crate"`.
impl Parse for LinkedAttribute {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let key: Ident = input.parse()?;
        if key != "crate_path" {
            return Err(syn::Error::new(key.span(), "expected attribute `crate_path`"));
        }

        let _: Token![=] = input.parse()?;
        let value: LitStr = input.parse()?;
        let path: syn::Path = value.parse()?;

        Ok(LinkedAttribute { crate_path: path })
    }
}

/// An `Anchor<Tag>` field found on the host struct.
struct AnchorField {
    ident: Ident,
    tag: Option<Type>,
}

/// Returns the anchor description if `ty` is spelled `Anchor` or `Anchor<Tag>`
/// (with any leading path).
fn anchor_tag(ty: &Type) -> syn::Result<Option<Option<Type>>> {
    let Type::Path(TypePath { qself: None, path }) = ty else {
        return Ok(None);
    };
    let Some(segment) = path.segments.last() else {
        return Ok(None);
    };
    if segment.ident != "Anchor" {
        return Ok(None);
    }

    match &segment.arguments {
        PathArguments::None => Ok(Some(None)),
        PathArguments::AngleBracketed(args) => {
            let mut types = args.args.iter().filter_map(|arg| match arg {
                GenericArgument::Type(ty) => Some(ty.clone()),
                _ => None,
            });
            match (types.next(), types.next()) {
                (Some(tag), None) => Ok(Some(Some(tag))),
                _ => Err(syn::Error::new_spanned(
                    args,
                    "`Anchor` takes exactly one tag type",
                )),
            }
        }
        PathArguments::Parenthesized(args) => Err(syn::Error::new_spanned(
            args,
            "`Anchor` takes exactly one tag type",
        )),
    }
}

/// Derive macro implementing `Linked<Tag>` for every `Anchor<Tag>` field.
///
/// ```ignore
/// #[derive(Linked)]
/// struct Task {
///     ready: Anchor<Ready>,
///     timers: Anchor<Timers>,
///     id: u64,
/// }
/// ```
#[proc_macro_derive(Linked, attributes(linked))]
pub fn linked_derive(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand(&input) {
        Ok(tokens) => tokens.into(),
        Err(e) => e.to_compile_error().into(),
    }
}

fn expand(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let struct_name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    // Find absolute crate path
    let mut crate_path = quote! { ::intrusive_ring };

    for attr in &input.attrs {
        if attr.path().is_ident("linked") {
            let path = attr.parse_args::<LinkedAttribute>()?.crate_path;
            crate_path = quote! { #path };
            break;
        }
    }

    let intrusive_path = quote! { #crate_path::linked_list::intrusive };

    let fields = match &input.data {
        Data::Struct(DataStruct {
            fields: Fields::Named(fields),
            ..
        }) => fields,
        _ => {
            return Err(syn::Error::new_spanned(
                input,
                "Linked derive macro only supports structs with named fields",
            ));
        }
    };

    let mut anchors: Vec<AnchorField> = Vec::new();
    for field in fields.named.iter() {
        let Some(ident) = &field.ident else {
            continue;
        };
        let Some(tag) = anchor_tag(&field.ty)? else {
            continue;
        };

        let key = tag_key(&tag);
        if anchors.iter().any(|other| tag_key(&other.tag) == key) {
            return Err(syn::Error::new_spanned(
                &field.ty,
                "two `Anchor` fields share the same tag; each tag needs its own anchor",
            ));
        }
        anchors.push(AnchorField {
            ident: ident.clone(),
            tag,
        });
    }

    if anchors.is_empty() {
        return Err(syn::Error::new_spanned(
            struct_name,
            "Struct must have at least one field of type `Anchor<Tag>`",
        ));
    }

    let impls = anchors.iter().map(|AnchorField { ident, tag }| {
        let tag = match tag {
            Some(tag) => quote! { #tag },
            None => quote! { #intrusive_path::traits::DefaultTag },
        };

        quote! {
            unsafe impl #impl_generics #intrusive_path::traits::Linked<#tag> for #struct_name #ty_generics #where_clause {
                #[inline]
                unsafe fn anchor_of(
                    host: ::core::ptr::NonNull<Self>,
                ) -> ::core::ptr::NonNull<#intrusive_path::anchor::Anchor<#tag>> {
                    unsafe {
                        ::core::ptr::NonNull::new_unchecked(
                            (&raw const (*host.as_ptr()).#ident).cast_mut(),
                        )
                    }
                }

                #[inline]
                unsafe fn host_of(
                    anchor: ::core::ptr::NonNull<#intrusive_path::anchor::Anchor<#tag>>,
                ) -> ::core::ptr::NonNull<Self> {
                    unsafe {
                        anchor
                            .byte_sub(::core::mem::offset_of!(Self, #ident))
                            .cast()
                    }
                }
            }
        }
    });

    Ok(quote! {
        #(#impls)*
    })
}

/// Token spelling used to detect duplicate tags; `None` is the default tag.
fn tag_key(tag: &Option<Type>) -> String {
    match tag {
        Some(tag) => quote! { #tag }.to_string(),
        None => String::from("DefaultTag"),
    }
}
